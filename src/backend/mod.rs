// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash: instance bootstrap, device selection,
// swapchain lifecycle, pipeline collaborator, per-frame sync.

pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use device::DeviceContext;
pub use pipeline::{PipelineProvider, TrianglePipeline};
pub use swapchain::Swapchain;
pub use sync::FrameSlot;
