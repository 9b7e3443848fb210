// Shader module loading
//
// SPIR-V is loaded from disk at run time (build.rs compiles the GLSL
// sources when glslc is available) and wrapped into a shader module.

use crate::error::{RenderError, RenderResult};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

/// Read a SPIR-V file and create a shader module from it.
pub fn load_shader_module(device: &ash::Device, path: &Path) -> RenderResult<vk::ShaderModule> {
    let bytes = std::fs::read(path).map_err(|source| RenderError::ShaderLoad {
        path: path.to_owned(),
        source,
    })?;

    let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| {
        RenderError::ShaderLoad {
            path: path.to_owned(),
            source,
        }
    })?;

    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(RenderError::creation("shader module"))
}
