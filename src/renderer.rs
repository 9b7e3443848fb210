// Renderer - the owned render context and the frame loop
//
// Owns every Vulkan object from the instance down and drives the per-frame
// state machine: wait fence -> acquire -> record -> submit -> present ->
// advance slot. Surface staleness (out-of-date/suboptimal) is absorbed by
// wholesale swapchain recreation and never surfaced to the caller.

use crate::backend::instance::{create_debug_messenger, create_instance};
use crate::backend::swapchain;
use crate::backend::{DeviceContext, FrameSlot, PipelineProvider, Swapchain};
use crate::config::Config;
use crate::error::{RenderError, RenderResult};
use crate::platform::SurfaceProvider;
use ash::vk;

/// Disposition of one acquire result.
///
/// A suboptimal acquire still draws; only present-time suboptimal triggers
/// recreation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireStep {
    Draw(u32),
    SkipAndRecreate,
    Abort(vk::Result),
}

pub(crate) fn acquire_step(result: Result<(u32, bool), vk::Result>) -> AcquireStep {
    match result {
        Ok((image_index, _suboptimal)) => AcquireStep::Draw(image_index),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => AcquireStep::SkipAndRecreate,
        Err(code) => AcquireStep::Abort(code),
    }
}

/// Disposition of one present result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PresentStep {
    Done,
    Recreate,
    Abort(vk::Result),
}

pub(crate) fn present_step(result: Result<bool, vk::Result>) -> PresentStep {
    match result {
        Ok(false) => PresentStep::Done,
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => PresentStep::Recreate,
        Err(code) => PresentStep::Abort(code),
    }
}

pub(crate) fn next_slot(current: usize, depth: usize) -> usize {
    (current + 1) % depth
}

/// The render context. One instance owns one device, one swapchain, and a
/// fixed ring of frame slots; all operations take it explicitly.
pub struct Renderer {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    ctx: DeviceContext,
    pipeline: Box<dyn PipelineProvider>,
    /// Chosen once at initialization and reused for every recreation; the
    /// pipeline was built against it and is never rebuilt.
    surface_format: vk::SurfaceFormatKHR,
    swapchain: Swapchain,
    command_pool: vk::CommandPool,
    frames: Vec<FrameSlot>,
    current_frame: usize,
    wait_stages: [vk::PipelineStageFlags; 1],
}

impl Renderer {
    /// Bootstrap the full context: instance, surface, device, pipeline,
    /// swapchain, command pool, and frame slots. Any failure aborts the
    /// whole initialization.
    pub fn initialize(
        app_name: &str,
        app_version: u32,
        platform: &dyn SurfaceProvider,
        mut pipeline: Box<dyn PipelineProvider>,
        config: &Config,
    ) -> RenderResult<Self> {
        log::info!("Initializing renderer: {}", app_name);

        let entry = unsafe { ash::Entry::load() }?;

        let enable_validation = config.debug.validation_layers;
        let platform_extensions = platform.required_extensions()?;
        let instance = create_instance(
            &entry,
            app_name,
            app_version,
            enable_validation,
            &platform_extensions,
        )?;

        let debug = if enable_validation {
            Some(create_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let surface = platform.create_surface(&entry, &instance)?;
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let ctx = DeviceContext::new(&instance, &surface_loader, surface)?;

        let (width, height) = platform.framebuffer_size();
        let extent = swapchain::resolve_extent(&ctx.capabilities, width, height);
        let surface_format = swapchain::choose_surface_format(&ctx.surface_formats);

        pipeline.create(&ctx.device, extent, surface_format.format)?;

        let swapchain = Swapchain::new(
            &instance,
            &ctx,
            surface,
            surface_format,
            extent,
            pipeline.render_pass(),
        )?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(ctx.graphics_family);
        let command_pool = unsafe { ctx.device.create_command_pool(&pool_info, None) }
            .map_err(RenderError::creation("command pool"))?;

        let depth = config.graphics.frames_in_flight.max(1);
        let frames = (0..depth)
            .map(|_| FrameSlot::new(&ctx.device, command_pool))
            .collect::<RenderResult<Vec<_>>>()?;

        log::info!("Renderer initialized ({} frames in flight)", depth);

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface,
            surface_loader,
            ctx,
            pipeline,
            surface_format,
            swapchain,
            command_pool,
            frames,
            current_frame: 0,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
        })
    }

    /// Render one frame. Returns `Ok` both for a drawn frame and for a
    /// skipped one (out-of-date surface, absorbed by recreation); errors are
    /// unrecoverable for this call.
    pub fn render_frame(&mut self, width: u32, height: u32) -> RenderResult<()> {
        let slot = self.frames[self.current_frame];

        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[slot.in_flight_fence], true, u64::MAX)
        }
        .map_err(RenderError::api("frame fence wait"))?;

        let extent = swapchain::resolve_extent(&self.ctx.capabilities, width, height);

        let acquired = unsafe {
            self.swapchain.loader.acquire_next_image(
                self.swapchain.handle,
                u64::MAX,
                slot.image_available,
                vk::Fence::null(),
            )
        };

        let image_index = match acquire_step(acquired) {
            AcquireStep::Draw(image_index) => image_index,
            AcquireStep::SkipAndRecreate => {
                log::debug!("Swapchain out of date at acquire, recreating");
                self.recreate_swapchain(extent)?;
                // Skip this frame; the next call renders against the new chain.
                return Ok(());
            }
            AcquireStep::Abort(code) => {
                log::error!("Failed to acquire swapchain image: {:?}", code);
                return Err(RenderError::Acquire(code));
            }
        };

        unsafe {
            self.ctx
                .device
                .reset_fences(&[slot.in_flight_fence])
                .map_err(RenderError::api("frame fence reset"))?;
            self.ctx
                .device
                .reset_command_buffer(slot.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(RenderError::Recording)?;
        }

        self.record(slot, image_index, extent)?;

        let wait_semaphores = [slot.image_available];
        let command_buffers = [slot.command_buffer];
        let signal_semaphores = [slot.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx.device.queue_submit(
                self.ctx.graphics_queue,
                &[submit_info],
                slot.in_flight_fence,
            )
        }
        .map_err(RenderError::Submission)?;

        let swapchains = [self.swapchain.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            self.swapchain
                .loader
                .queue_present(self.ctx.present_queue, &present_info)
        };

        match present_step(presented) {
            PresentStep::Done => {}
            PresentStep::Recreate => {
                log::debug!("Swapchain stale at present, recreating");
                self.recreate_swapchain(extent)?;
            }
            PresentStep::Abort(code) => {
                log::error!("Failed to present swapchain image: {:?}", code);
                return Err(RenderError::Presentation(code));
            }
        }

        self.current_frame = next_slot(self.current_frame, self.frames.len());
        Ok(())
    }

    /// Record the fixed draw into the slot's command buffer.
    fn record(&self, slot: FrameSlot, image_index: u32, extent: vk::Extent2D) -> RenderResult<()> {
        let device = &self.ctx.device;

        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe { device.begin_command_buffer(slot.command_buffer, &begin_info) }
            .map_err(RenderError::Recording)?;

        self.pipeline.begin(
            device,
            slot.command_buffer,
            self.swapchain.framebuffers[image_index as usize],
            extent,
        );

        unsafe {
            device.cmd_draw(slot.command_buffer, 3, 1, 0, 0);
            device.cmd_end_render_pass(slot.command_buffer);
            device
                .end_command_buffer(slot.command_buffer)
                .map_err(RenderError::Recording)?;
        }

        Ok(())
    }

    /// Wholesale swapchain replacement: wait idle, tear down, rebuild with
    /// the cached surface format. Command pool, frame slots, and pipeline
    /// are reused.
    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> RenderResult<()> {
        self.wait_idle()?;
        self.swapchain.destroy(&self.ctx.device);
        self.swapchain = Swapchain::new(
            &self.instance,
            &self.ctx,
            self.surface,
            self.surface_format,
            extent,
            self.pipeline.render_pass(),
        )?;
        Ok(())
    }

    /// Block until all submitted GPU work has retired.
    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(RenderError::api("device wait-idle"))
    }

    /// Wait for the GPU and release everything. Equivalent to dropping the
    /// renderer, but surfaces a wait-idle failure instead of swallowing it.
    pub fn shutdown(self) -> RenderResult<()> {
        self.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Destroying renderer");

        unsafe {
            let _ = self.ctx.device.device_wait_idle();

            for slot in &self.frames {
                slot.destroy(&self.ctx.device);
            }
            self.ctx.device.destroy_command_pool(self.command_pool, None);
            self.swapchain.destroy(&self.ctx.device);
            self.pipeline.destroy(&self.ctx.device);
            self.ctx.device.destroy_device(None);

            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_proceeds_on_success_and_suboptimal() {
        assert_eq!(acquire_step(Ok((2, false))), AcquireStep::Draw(2));
        // Suboptimal at acquire still draws; recreation waits for present.
        assert_eq!(acquire_step(Ok((0, true))), AcquireStep::Draw(0));
    }

    // An out-of-date acquire skips the frame's draw entirely and asks for
    // recreation; the render call still succeeds.
    #[test]
    fn acquire_out_of_date_skips_draw() {
        let step = acquire_step(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(step, AcquireStep::SkipAndRecreate);
        assert!(!matches!(step, AcquireStep::Draw(_)));
    }

    #[test]
    fn acquire_aborts_on_other_errors() {
        assert_eq!(
            acquire_step(Err(vk::Result::ERROR_DEVICE_LOST)),
            AcquireStep::Abort(vk::Result::ERROR_DEVICE_LOST)
        );
    }

    #[test]
    fn present_recreates_on_staleness() {
        assert_eq!(present_step(Ok(false)), PresentStep::Done);
        assert_eq!(present_step(Ok(true)), PresentStep::Recreate);
        assert_eq!(
            present_step(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            PresentStep::Recreate
        );
        assert_eq!(
            present_step(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            PresentStep::Abort(vk::Result::ERROR_SURFACE_LOST_KHR)
        );
    }

    #[test]
    fn slot_rotation_returns_to_start_after_depth_frames() {
        for depth in 1..=4 {
            let start = 0;
            let mut slot = start;
            for _ in 0..depth {
                slot = next_slot(slot, depth);
            }
            assert_eq!(slot, start, "depth {depth}");
        }
    }

    #[test]
    fn slot_rotation_is_round_robin() {
        let mut slot = 0;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(slot);
            slot = next_slot(slot, 3);
        }
        assert_eq!(seen, [0, 1, 2, 0, 1, 2]);
    }
}
