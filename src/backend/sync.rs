// Per-frame synchronization and command resources
//
// One slot per frame in flight. The fence starts signaled so the first
// wait on each slot falls through.

use crate::error::{RenderError, RenderResult};
use ash::vk;

/// Frame-in-flight slot: one command buffer plus the sync primitives that
/// order its reuse against the GPU.
#[derive(Clone, Copy)]
pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSlot {
    pub fn new(device: &ash::Device, command_pool: vk::CommandPool) -> RenderResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
            .map_err(RenderError::creation("command buffer"))?[0];

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            Ok(Self {
                command_buffer,
                image_available: device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(RenderError::creation("semaphore"))?,
                render_finished: device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(RenderError::creation("semaphore"))?,
                in_flight_fence: device
                    .create_fence(&fence_info, None)
                    .map_err(RenderError::creation("fence"))?,
            })
        }
    }

    /// The command buffer is freed with its pool; only the sync primitives
    /// are destroyed here.
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}
