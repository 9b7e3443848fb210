// vkframe - Vulkan frame-lifecycle renderer
//
// Device selection, swapchain lifecycle, per-frame synchronization, and
// command submission for an N-buffered present loop. The windowing system
// and the graphics pipeline are injected collaborators (`SurfaceProvider`,
// `PipelineProvider`); default implementations for both live in this crate.

pub mod backend;
pub mod config;
pub mod error;
pub mod platform;
pub mod renderer;

pub use backend::{PipelineProvider, TrianglePipeline};
pub use config::Config;
pub use error::{RenderError, RenderResult};
pub use platform::{SurfaceProvider, WindowSurface};
pub use renderer::Renderer;
