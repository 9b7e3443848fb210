// Swapchain - window presentation
//
// Derives the usable surface extent, chooses format and present mode from
// the cached surface queries, and owns the image/view/framebuffer ring.
// Destroyed and recreated wholesale on resize; never partially mutated.

use crate::backend::device::DeviceContext;
use crate::error::{RenderError, RenderResult};
use ash::vk;

/// Resolve the swapchain extent for a requested framebuffer size.
///
/// A defined current extent is taken verbatim; the undefined sentinel
/// (`u32::MAX` width) means the surface lets us pick, clamped per axis into
/// the capability bounds.
pub fn resolve_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Choose the surface format: prefer B8G8R8A8_SRGB with the sRGB nonlinear
/// color space, else the first format the surface reports.
///
/// Device scoring rejects surfaces with no formats, so the list is nonempty
/// by the time selection runs.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| formats[0])
}

/// Choose the present mode: prefer MAILBOX (low-latency triple buffering),
/// else FIFO, which every conformant device supports.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&m| m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Resolve the image count: one above the minimum, clamped to a nonzero
/// declared maximum.
pub fn resolve_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

pub struct Swapchain {
    pub loader: ash::khr::swapchain::Device,
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain, its image views, and one framebuffer per view
    /// against the externally-owned render pass.
    ///
    /// Invariant: `images`, `image_views`, and `framebuffers` always have
    /// equal length.
    pub fn new(
        instance: &ash::Instance,
        ctx: &DeviceContext,
        surface: vk::SurfaceKHR,
        format: vk::SurfaceFormatKHR,
        extent: vk::Extent2D,
        render_pass: vk::RenderPass,
    ) -> RenderResult<Self> {
        let present_mode = choose_present_mode(&ctx.present_modes);
        let image_count = resolve_image_count(&ctx.capabilities);

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            image_count,
            format.format,
            present_mode
        );

        // Declared before the create info so the borrow in the concurrent
        // branch outlives it.
        let family_indices = [ctx.graphics_family, ctx.present_family];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(ctx.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        // Concurrent sharing only when the images really cross families;
        // exclusive access skips ownership-transfer barriers otherwise.
        if ctx.graphics_family != ctx.present_family {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let loader = ash::khr::swapchain::Device::new(instance, &ctx.device);
        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(RenderError::creation("swapchain"))?;

        let images = unsafe { loader.get_swapchain_images(handle) }
            .map_err(RenderError::api("swapchain image query"))?;

        let image_views = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { ctx.device.create_image_view(&view_info, None) }
                    .map_err(RenderError::creation("image view"))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let framebuffers = image_views
            .iter()
            .map(|view| {
                let attachments = std::slice::from_ref(view);
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                unsafe { ctx.device.create_framebuffer(&framebuffer_info, None) }
                    .map_err(RenderError::creation("framebuffer"))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        Ok(Self {
            loader,
            handle,
            images,
            image_views,
            framebuffers,
            format,
            extent,
        })
    }

    /// Tear down framebuffers, then views, then the swapchain itself.
    /// Must run before recreation and before device destruction; the caller
    /// guarantees the GPU is idle.
    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
        self.framebuffers.clear();
        self.image_views.clear();
        self.images.clear();
        self.handle = vk::SwapchainKHR::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        current: (u32, u32),
        min_extent: (u32, u32),
        max_extent: (u32, u32),
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    #[test]
    fn defined_current_extent_wins_over_request() {
        let caps = caps((800, 600), (1, 1), (4096, 4096), 2, 0);
        let extent = resolve_extent(&caps, 1920, 1080);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_extent_clamps_each_axis() {
        let caps = caps((u32::MAX, u32::MAX), (200, 100), (1000, 900), 2, 0);

        let small = resolve_extent(&caps, 10, 10);
        assert_eq!((small.width, small.height), (200, 100));

        let large = resolve_extent(&caps, 5000, 5000);
        assert_eq!((large.width, large.height), (1000, 900));

        let mixed = resolve_extent(&caps, 10, 5000);
        assert_eq!((mixed.width, mixed.height), (200, 900));

        let inside = resolve_extent(&caps, 640, 480);
        assert_eq!((inside.width, inside.height), (640, 480));
    }

    #[test]
    fn preferred_format_is_selected_when_present() {
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let chosen = choose_surface_format(&[other, preferred]);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        // Right format but wrong color space does not count as preferred.
        let near_miss = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let chosen = choose_surface_format(&[near_miss, other]);
        assert_eq!(chosen.format, near_miss.format);
        assert_eq!(chosen.color_space, near_miss.color_space);
    }

    #[test]
    fn mailbox_preferred_fifo_fallback() {
        assert_eq!(
            choose_present_mode(&[
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::IMMEDIATE,
            ]),
            vk::PresentModeKHR::MAILBOX
        );

        // Fallback is unconditional, even if FIFO was never enumerated.
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(choose_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn image_count_is_min_plus_one_when_unbounded() {
        let caps = caps((0, 0), (0, 0), (0, 0), 2, 0);
        assert_eq!(resolve_image_count(&caps), 3);
    }

    #[test]
    fn image_count_clamps_to_nonzero_maximum() {
        let tight = caps((0, 0), (0, 0), (0, 0), 3, 3);
        assert_eq!(resolve_image_count(&tight), 3);

        let roomy = caps((0, 0), (0, 0), (0, 0), 4, 8);
        assert_eq!(resolve_image_count(&roomy), 5);
    }

    // Recreation with unchanged capabilities must resolve to structurally
    // identical parameters both times.
    #[test]
    fn selection_is_deterministic_across_recreation() {
        let caps = caps((u32::MAX, 0), (100, 100), (2000, 2000), 2, 4);
        let first = (resolve_extent(&caps, 800, 600), resolve_image_count(&caps));
        let second = (resolve_extent(&caps, 800, 600), resolve_image_count(&caps));
        assert_eq!(first.0.width, second.0.width);
        assert_eq!(first.0.height, second.0.height);
        assert_eq!(first.1, second.1);
    }
}
