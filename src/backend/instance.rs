// Instance bootstrap
//
// Instance creation with validation layers and platform surface extensions,
// plus the debug messenger that routes validation output into `log`.

use crate::error::{RenderError, RenderResult};
use ash::vk;
use std::ffi::{c_char, CStr, CString};

/// Create the Vulkan instance.
///
/// `platform_extensions` comes from the surface provider; the debug-utils
/// extension and the Khronos validation layer are appended when
/// `enable_validation` is set.
pub fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    app_version: u32,
    enable_validation: bool,
    platform_extensions: &[*const c_char],
) -> RenderResult<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|_| RenderError::Platform("application name contains a NUL byte".to_string()))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(app_version)
        .api_version(vk::API_VERSION_1_3);

    let mut extensions = platform_extensions.to_vec();
    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layers = if enable_validation {
        vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    unsafe { entry.create_instance(&create_info, None) }
        .map_err(RenderError::creation("instance"))
}

/// Install a debug messenger forwarding validation messages to `log`.
pub fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> RenderResult<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .map_err(RenderError::creation("debug messenger"))?;

    Ok((debug_utils, messenger))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
