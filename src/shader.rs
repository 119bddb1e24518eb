// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render shader sources.

use crate::error::Error;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    stage: ShaderStage,
    //may need additional type design for future backends
    code: String,
}

impl Shader {
    pub fn new(stage: ShaderStage, code: impl Into<String>) -> Self {
        Shader {
            stage,
            code: code.into(),
        }
    }

    pub fn from_file(stage: ShaderStage, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let code = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(stage, code))
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Compiles a WGSL vertex or fragment shader.  wgpu has no geometry stage, so geometry
    /// shaders return `None`.
    #[cfg(feature = "backend_wgpu")]
    pub fn wgpu_module(&self, device: &wgpu::Device) -> Option<wgpu::ShaderModule> {
        let label = match self.stage {
            ShaderStage::Vertex => "neutrino vertex shader",
            ShaderStage::Fragment => "neutrino fragment shader",
            ShaderStage::Geometry => return None,
        };
        Some(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(self.code.as_str().into()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_stage_and_code() {
        let shader = Shader::new(ShaderStage::Fragment, "@fragment fn main() {}");
        assert_eq!(shader.stage(), ShaderStage::Fragment);
        assert_eq!(shader.code(), "@fragment fn main() {}");
        assert!(matches!(
            Shader::from_file(ShaderStage::Vertex, "/nonexistent/neutrino.vert"),
            Err(Error::Io { .. })
        ));
    }
}
