//! Compilation options threaded through every codegen operation.

use rowfn_error::{Result, RowFnError};
use serde::{Deserialize, Serialize};

/// Key width used for group-by slots without compaction.
pub const DEFAULT_KEY_WIDTH: usize = std::mem::size_of::<i64>();

/// Narrowest key width allowed once key compaction is enabled.
pub const COMPACTED_MIN_KEY_WIDTH: usize = std::mem::size_of::<i32>();

/// Where the compiled row function runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Cpu,
    Gpu,
}

/// GPU hardware generation, as far as codegen workarounds care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuArchitecture {
    Kepler,
    Maxwell,
    Pascal,
    Volta,
    Turing,
    Ampere,
}

/// Per-compilation configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilationOptions {
    pub device_type: DeviceType,
    /// Target GPU generation; only meaningful when `device_type` is `Gpu`.
    pub gpu_architecture: Option<GpuArchitecture>,
    /// Offset iteration positions of secondary relations by their fragment
    /// offsets.
    pub multifrag_join: bool,
    /// Allow group-by keys narrower than [`DEFAULT_KEY_WIDTH`].
    pub key_compaction: bool,
}

impl CompilationOptions {
    /// CPU compilation with every optional feature off.
    pub const fn cpu() -> Self {
        Self {
            device_type: DeviceType::Cpu,
            gpu_architecture: None,
            multifrag_join: false,
            key_compaction: false,
        }
    }

    /// GPU compilation for the given hardware generation.
    pub const fn gpu(arch: GpuArchitecture) -> Self {
        Self {
            device_type: DeviceType::Gpu,
            gpu_architecture: Some(arch),
            multifrag_join: false,
            key_compaction: false,
        }
    }

    #[must_use]
    pub const fn with_multifrag_join(mut self, enabled: bool) -> Self {
        self.multifrag_join = enabled;
        self
    }

    #[must_use]
    pub const fn with_key_compaction(mut self, enabled: bool) -> Self {
        self.key_compaction = enabled;
        self
    }

    #[must_use]
    pub const fn with_device(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    #[must_use]
    pub const fn with_gpu_architecture(mut self, arch: Option<GpuArchitecture>) -> Self {
        self.gpu_architecture = arch;
        self
    }

    /// Whether the target is a Maxwell-generation GPU.
    pub const fn is_maxwell(&self) -> bool {
        matches!(self.device_type, DeviceType::Gpu)
            && matches!(self.gpu_architecture, Some(GpuArchitecture::Maxwell))
    }

    /// Whether `width` bytes is an acceptable group-by key width.
    pub const fn accepts_key_width(&self, width: usize) -> bool {
        if self.key_compaction {
            width >= COMPACTED_MIN_KEY_WIDTH
        } else {
            width == DEFAULT_KEY_WIDTH
        }
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.device_type, DeviceType::Cpu) && self.gpu_architecture.is_some() {
            return Err(RowFnError::InvalidOptions(
                "gpu_architecture set for a cpu device".to_owned(),
            ));
        }
        Ok(())
    }

    /// Parse and validate options from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|error| RowFnError::InvalidOptions(error.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|error| RowFnError::internal(error.to_string()))
    }
}
