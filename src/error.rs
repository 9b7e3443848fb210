// Error taxonomy for the renderer
//
// Every fallible step maps to one variant; Vulkan failures carry the
// originating vk::Result so diagnostics keep the numeric code.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("no suitable Vulkan device (required extensions or surface support missing)")]
    NoSuitableDevice,

    #[error("no queue family supports graphics operations")]
    NoGraphicsQueue,

    #[error("no queue family can present to the surface")]
    NoPresentQueue,

    #[error("failed to create {object}: {code:?}")]
    ObjectCreation {
        object: &'static str,
        code: vk::Result,
    },

    #[error("failed to record command buffer: {0:?}")]
    Recording(vk::Result),

    #[error("failed to submit to the graphics queue: {0:?}")]
    Submission(vk::Result),

    #[error("failed to present swapchain image: {0:?}")]
    Presentation(vk::Result),

    #[error("failed to acquire swapchain image: {0:?}")]
    Acquire(vk::Result),

    #[error("{op} failed: {code:?}")]
    Api { op: &'static str, code: vk::Result },

    #[error("failed to load shader {path:?}: {source}")]
    ShaderLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("platform error: {0}")]
    Platform(String),
}

impl RenderError {
    /// Adapter for `map_err` on creation calls: tags the failing object kind.
    pub(crate) fn creation(object: &'static str) -> impl FnOnce(vk::Result) -> RenderError {
        move |code| RenderError::ObjectCreation { object, code }
    }

    /// Adapter for `map_err` on queries and fence/idle operations.
    pub(crate) fn api(op: &'static str) -> impl FnOnce(vk::Result) -> RenderError {
        move |code| RenderError::Api { op, code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_creation_reports_kind_and_code() {
        let err = RenderError::creation("swapchain")(vk::Result::ERROR_DEVICE_LOST);
        let msg = err.to_string();
        assert!(msg.contains("swapchain"), "{msg}");
        assert!(msg.contains("ERROR_DEVICE_LOST"), "{msg}");
    }

    #[test]
    fn api_reports_operation() {
        let err = RenderError::api("frame fence wait")(vk::Result::TIMEOUT);
        assert!(err.to_string().starts_with("frame fence wait"));
    }
}
