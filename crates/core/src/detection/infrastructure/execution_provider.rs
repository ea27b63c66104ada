use std::path::Path;

use serde::{Deserialize, Serialize};

/// Hides all GPUs when set to an empty string.
const VISIBLE_DEVICES_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// Inference device for the ONNX models. One device per process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Platform accelerator when available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
}

impl Device {
    /// Applies the environment: an empty `CUDA_VISIBLE_DEVICES` forces CPU.
    pub fn resolve(self) -> Device {
        self.resolve_with(std::env::var(VISIBLE_DEVICES_ENV).ok().as_deref())
    }

    fn resolve_with(self, visible_devices: Option<&str>) -> Device {
        match (self, visible_devices) {
            (Device::Auto, Some(v)) if v.trim().is_empty() => Device::Cpu,
            (device, _) => device,
        }
    }
}

/// Return the execution providers to try for `device`, in priority order.
///
/// An empty list means ONNX Runtime's default CPU provider.
pub fn preferred_execution_providers(
    device: Device,
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    if device == Device::Cpu {
        return vec![];
    }
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Loads an ONNX model on the resolved device.
pub fn build_session(
    model_path: &Path,
    device: Device,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let device = device.resolve();
    log::debug!("Loading {} on {device:?}", model_path.display());
    let session = ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers(device))?
        .commit_from_file(model_path)?;
    Ok(session)
}
