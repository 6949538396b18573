use std::fmt;

/// Capability tag describing where an Array's data is meant to be processed.
///
/// Only `Cpu` has kernels. `Cuda` is reserved for a future backend: arrays may
/// carry the tag, but every kernel rejects it with `Error::UnsupportedDevice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    /// A human-readable name for this device.
    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
