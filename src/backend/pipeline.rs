// Render pass and graphics pipeline collaborator
//
// The frame loop does not build pipelines; it consumes this trait. The
// provider owns the render pass (framebuffers are created against it), is
// asked once at device creation to build its state for the chosen surface
// format and extent, and begins the pass + binds state for each recorded
// frame.

use crate::backend::shader::load_shader_module;
use crate::error::{RenderError, RenderResult};
use ash::vk;
use std::path::PathBuf;

pub trait PipelineProvider {
    /// Build the render pass and pipeline for the chosen surface format.
    /// Called once, after device creation, before the first framebuffer.
    fn create(
        &mut self,
        device: &ash::Device,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> RenderResult<()>;

    /// The render pass swapchain framebuffers are created against.
    fn render_pass(&self) -> vk::RenderPass;

    /// Begin the render pass on `framebuffer` and bind all state needed for
    /// the frame's draw call.
    fn begin(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    );

    fn destroy(&mut self, device: &ash::Device);
}

/// Default provider: a fixed fullscreen-triangle pipeline. Positions are
/// synthesized in the vertex shader, so there is no vertex input state.
pub struct TrianglePipeline {
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
    clear_color: [f32; 4],
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl TrianglePipeline {
    pub fn new(
        vertex_shader: impl Into<PathBuf>,
        fragment_shader: impl Into<PathBuf>,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            clear_color,
            render_pass: vk::RenderPass::null(),
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
        }
    }

    fn create_render_pass(device: &ash::Device, format: vk::Format) -> RenderResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        // The submit waits on the acquire semaphore at color-attachment
        // output; this dependency makes the layout transition wait there too.
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let attachments = [color_attachment];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { device.create_render_pass(&create_info, None) }
            .map_err(RenderError::creation("render pass"))
    }
}

impl PipelineProvider for TrianglePipeline {
    fn create(
        &mut self,
        device: &ash::Device,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> RenderResult<()> {
        self.render_pass = Self::create_render_pass(device, format)?;

        let vert_module = load_shader_module(device, &self.vertex_shader)?;
        let frag_module = load_shader_module(device, &self.fragment_shader)?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        // No vertex buffers; the vertex shader generates the triangle.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        self.layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(RenderError::creation("pipeline layout"))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(self.layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let result = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        // Shader modules are compiled into the pipeline; drop them either way.
        unsafe {
            device.destroy_shader_module(vert_module, None);
            device.destroy_shader_module(frag_module, None);
        }

        self.pipeline = result
            .map_err(|(_, code)| RenderError::creation("graphics pipeline")(code))?[0];

        log::info!("Created triangle pipeline ({:?}, {}x{})", format, extent.width, extent.height);

        Ok(())
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn begin(
        &self,
        device: &ash::Device,
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.destroy_pipeline(self.pipeline, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                device.destroy_pipeline_layout(self.layout, None);
            }
            if self.render_pass != vk::RenderPass::null() {
                device.destroy_render_pass(self.render_pass, None);
            }
        }
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
        self.render_pass = vk::RenderPass::null();
    }
}
