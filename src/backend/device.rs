// Device selection and queue management
//
// Responsibilities:
// - Per-device capability snapshot (extensions, surface formats, present modes)
// - Device scoring and selection (prefer discrete GPU)
// - Queue family search (graphics and present may be distinct families)
// - Logical device + queue creation, surface capability caching

use crate::error::{RenderError, RenderResult};
use ash::vk;
use std::ffi::{c_char, CStr, CString};

/// Device extensions the renderer cannot run without.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Snapshot of the facts about one physical device that drive selection.
///
/// Everything is queried up front so scoring and selection run on owned
/// data; the selected device's profile is kept in [`DeviceContext`] as the
/// format/present-mode cache for swapchain creation.
pub struct DeviceProfile {
    pub device_type: vk::PhysicalDeviceType,
    pub extensions: Vec<CString>,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl DeviceProfile {
    /// Query the profile for one physical device / surface pair.
    ///
    /// Enumeration failures for formats and present modes are folded into
    /// empty lists: an unenumerable surface is an unsupported surface.
    pub fn query(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        unsafe {
            let properties = instance.get_physical_device_properties(physical_device);

            let extensions = instance
                .enumerate_device_extension_properties(physical_device)
                .unwrap_or_default()
                .iter()
                .filter_map(|e| e.extension_name_as_c_str().ok().map(CString::from))
                .collect();

            let surface_formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .unwrap_or_default();

            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .unwrap_or_default();

            Self {
                device_type: properties.device_type,
                extensions,
                surface_formats,
                present_modes,
            }
        }
    }
}

/// Tier score by device type.
pub fn type_tier(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        _ => 1,
    }
}

/// Score a device for suitability. Zero means ineligible: a required
/// extension is missing, or the surface reports no formats/present modes.
pub fn score_device(profile: &DeviceProfile, required_extensions: &[&CStr]) -> u32 {
    let all_present = required_extensions
        .iter()
        .all(|required| profile.extensions.iter().any(|have| have.as_c_str() == *required));
    if !all_present {
        return 0;
    }

    if profile.surface_formats.is_empty() || profile.present_modes.is_empty() {
        return 0;
    }

    type_tier(profile.device_type)
}

/// Index of the best-scoring device: highest score wins, first-seen
/// tie-break. `None` if nothing scores above zero.
pub fn pick_best(scores: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// First queue family (in index order) supporting graphics operations.
pub fn first_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

/// First queue family (in index order) able to present to the surface.
pub fn first_present_family(
    family_count: u32,
    mut supports_present: impl FnMut(u32) -> bool,
) -> Option<u32> {
    (0..family_count).find(|&i| supports_present(i))
}

/// The active device context: selected GPU, logical device, queues, and the
/// cached surface query results the swapchain is built from.
pub struct DeviceContext {
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,
    /// Cached at selection time; the surface does not change post-creation.
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Queried once at device creation and reused for extent resolution
    /// and every recreation.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
}

impl DeviceContext {
    /// Enumerate, score, and select a physical device, then create the
    /// logical device and retrieve its queues.
    pub fn new(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> RenderResult<Self> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(RenderError::api("physical device enumeration"))?;

        let mut profiles: Vec<DeviceProfile> = physical_devices
            .iter()
            .map(|&pd| DeviceProfile::query(instance, surface_loader, surface, pd))
            .collect();

        let scores: Vec<u32> = profiles
            .iter()
            .map(|p| score_device(p, &REQUIRED_DEVICE_EXTENSIONS))
            .collect();

        for (&pd, &score) in physical_devices.iter().zip(&scores) {
            let properties = unsafe { instance.get_physical_device_properties(pd) };
            log::debug!(
                "Candidate GPU: {} ({:?}), score {}",
                properties.device_name_as_c_str().unwrap_or(c"unknown").to_string_lossy(),
                properties.device_type,
                score
            );
        }

        let best = pick_best(&scores).ok_or(RenderError::NoSuitableDevice)?;
        let physical_device = physical_devices[best];
        let profile = profiles.swap_remove(best);

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {} (score {})",
            properties.device_name_as_c_str().unwrap_or(c"unknown").to_string_lossy(),
            scores[best]
        );

        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let graphics_family =
            first_graphics_family(&families).ok_or(RenderError::NoGraphicsQueue)?;
        let present_family = first_present_family(families.len() as u32, |i| {
            unsafe {
                surface_loader.get_physical_device_surface_support(physical_device, i, surface)
            }
            .unwrap_or(false)
        })
        .ok_or(RenderError::NoPresentQueue)?;

        let queue_priorities = [1.0];
        let mut queue_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_family)
            .queue_priorities(&queue_priorities)];
        if present_family != graphics_family {
            queue_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(present_family)
                    .queue_priorities(&queue_priorities),
            );
        }

        let extension_names: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|e| e.as_ptr())
            .collect();

        // No device features beyond the baseline are requested.
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(RenderError::creation("logical device"))?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
        }
        .map_err(RenderError::api("surface capability query"))?;

        Ok(Self {
            physical_device,
            device,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
            surface_formats: profile.surface_formats,
            present_modes: profile.present_modes,
            capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(
        device_type: vk::PhysicalDeviceType,
        extensions: &[&CStr],
        format_count: usize,
        mode_count: usize,
    ) -> DeviceProfile {
        DeviceProfile {
            device_type,
            extensions: extensions.iter().map(|&e| CString::from(e)).collect(),
            surface_formats: vec![vk::SurfaceFormatKHR::default(); format_count],
            present_modes: vec![vk::PresentModeKHR::FIFO; mode_count],
        }
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(type_tier(vk::PhysicalDeviceType::DISCRETE_GPU)
            > type_tier(vk::PhysicalDeviceType::INTEGRATED_GPU));
        assert!(type_tier(vk::PhysicalDeviceType::INTEGRATED_GPU)
            > type_tier(vk::PhysicalDeviceType::VIRTUAL_GPU));
        assert!(type_tier(vk::PhysicalDeviceType::VIRTUAL_GPU)
            > type_tier(vk::PhysicalDeviceType::CPU));
        assert_eq!(type_tier(vk::PhysicalDeviceType::OTHER), 1);
    }

    #[test]
    fn missing_extension_scores_zero() {
        let p = profile(vk::PhysicalDeviceType::DISCRETE_GPU, &[], 1, 1);
        assert_eq!(score_device(&p, &REQUIRED_DEVICE_EXTENSIONS), 0);
    }

    #[test]
    fn empty_formats_or_modes_score_zero() {
        let p = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[ash::khr::swapchain::NAME],
            0,
            1,
        );
        assert_eq!(score_device(&p, &REQUIRED_DEVICE_EXTENSIONS), 0);

        let p = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[ash::khr::swapchain::NAME],
            1,
            0,
        );
        assert_eq!(score_device(&p, &REQUIRED_DEVICE_EXTENSIONS), 0);
    }

    #[test]
    fn discrete_outscores_integrated_with_equal_support() {
        let discrete = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[ash::khr::swapchain::NAME],
            1,
            1,
        );
        let integrated = profile(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            &[ash::khr::swapchain::NAME],
            1,
            1,
        );
        assert!(
            score_device(&discrete, &REQUIRED_DEVICE_EXTENSIONS)
                > score_device(&integrated, &REQUIRED_DEVICE_EXTENSIONS)
        );
    }

    #[test]
    fn extra_extensions_do_not_hurt() {
        let p = profile(
            vk::PhysicalDeviceType::CPU,
            &[c"VK_KHR_maintenance1", ash::khr::swapchain::NAME],
            1,
            1,
        );
        assert_eq!(score_device(&p, &REQUIRED_DEVICE_EXTENSIONS), 1);
    }

    #[test]
    fn pick_best_takes_first_seen_maximum() {
        assert_eq!(pick_best(&[3, 4, 4, 1]), Some(1));
        assert_eq!(pick_best(&[1]), Some(0));
    }

    #[test]
    fn pick_best_rejects_all_zero() {
        assert_eq!(pick_best(&[0, 0, 0]), None);
        assert_eq!(pick_best(&[]), None);
    }

    // Two-device selection scenario: A lacks the swapchain extension, B has
    // it plus a nonempty format/mode list; B must win even though A is the
    // stronger GPU type.
    #[test]
    fn device_without_swapchain_extension_loses_selection() {
        let a = profile(vk::PhysicalDeviceType::DISCRETE_GPU, &[], 1, 1);
        let b = profile(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            &[ash::khr::swapchain::NAME],
            1,
            1,
        );
        let scores = [
            score_device(&a, &REQUIRED_DEVICE_EXTENSIONS),
            score_device(&b, &REQUIRED_DEVICE_EXTENSIONS),
        ];
        assert_eq!(pick_best(&scores), Some(1));
    }

    #[test]
    fn graphics_family_is_first_match() {
        let families = [
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::TRANSFER,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS,
                ..Default::default()
            },
        ];
        assert_eq!(first_graphics_family(&families), Some(1));
    }

    #[test]
    fn graphics_family_absent() {
        let families = [vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::TRANSFER,
            ..Default::default()
        }];
        assert_eq!(first_graphics_family(&families), None);
    }

    #[test]
    fn present_family_scans_in_index_order() {
        assert_eq!(first_present_family(4, |i| i >= 2), Some(2));
        assert_eq!(first_present_family(4, |_| false), None);
        assert_eq!(first_present_family(0, |_| true), None);
    }
}
