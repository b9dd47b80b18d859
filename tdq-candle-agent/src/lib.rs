//! Time-conditioned DQN agent for continuous actions, implemented with
//! [candle](https://crates.io/crates/candle-core).
pub mod dqn;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use anyhow::Result;
use candle_core::DeviceLocation;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),

    /// The Metal device with the given ordinal.
    Metal(usize),
}

impl From<&candle_core::Device> for Device {
    fn from(device: &candle_core::Device) -> Self {
        match device.location() {
            DeviceLocation::Cpu => Self::Cpu,
            DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            DeviceLocation::Metal { gpu_id } => Self::Metal(gpu_id),
        }
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = anyhow::Error;

    /// Fails if the device is not available, e.g. the crate was built without CUDA.
    fn try_from(device: Device) -> Result<Self> {
        Ok(match device {
            Device::Cpu => candle_core::Device::Cpu,
            Device::Cuda(n) => candle_core::Device::new_cuda(n)?,
            Device::Metal(n) => candle_core::Device::new_metal(n)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cpu_device_roundtrip() -> Result<()> {
        let device = candle_core::Device::try_from(Device::Cpu)?;
        assert!(device.is_cpu());
        assert_eq!(Device::from(&device), Device::Cpu);
        Ok(())
    }
}
