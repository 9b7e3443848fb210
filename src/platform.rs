// Platform surface provider
//
// The renderer never talks to the windowing system directly. It consumes
// this trait for the three things it needs from the platform: the instance
// extensions presentation requires, a surface handle, and the current
// framebuffer size. Swapping the windowing backend means swapping the
// provider passed at initialization, not rebuilding the renderer.

use crate::error::{RenderError, RenderResult};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_char;
use std::sync::Arc;
use winit::window::Window;

pub trait SurfaceProvider {
    /// Instance extensions required to present to this platform's surfaces
    /// (the generic surface extension plus the platform-specific one).
    fn required_extensions(&self) -> RenderResult<Vec<*const c_char>>;

    /// Create the presentable surface for this platform.
    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> RenderResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

/// Production provider backed by a winit window.
pub struct WindowSurface {
    window: Arc<Window>,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl SurfaceProvider for WindowSurface {
    fn required_extensions(&self) -> RenderResult<Vec<*const c_char>> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| RenderError::Platform(format!("failed to get display handle: {e}")))?;

        let names = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| RenderError::Platform(format!("failed to enumerate surface extensions: {e}")))?;

        Ok(names.to_vec())
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> RenderResult<vk::SurfaceKHR> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| RenderError::Platform(format!("failed to get display handle: {e}")))?;
        let window = self
            .window
            .window_handle()
            .map_err(|e| RenderError::Platform(format!("failed to get window handle: {e}")))?;

        unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
        }
        .map_err(RenderError::creation("surface"))
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}
