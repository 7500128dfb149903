use candle_core::Device;

#[cfg(any(feature = "metal", feature = "cuda"))]
use tracing::{info, warn};

/// Picks the compute device for inference.
///
/// GPU backends are only tried when compiled in; any failure falls back to CPU
/// so a misconfigured accelerator never stops the service from starting.
pub fn select_device() -> Device {
    #[cfg(any(feature = "metal", feature = "cuda"))]
    let mut failures: Vec<String> = Vec::new();

    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            info!("Scoring on Metal GPU");
            return device;
        }
        Err(e) => failures.push(format!("metal: {e}")),
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            info!("Scoring on CUDA GPU");
            return device;
        }
        Err(e) => failures.push(format!("cuda: {e}")),
    }

    #[cfg(any(feature = "metal", feature = "cuda"))]
    warn!(failures = %failures.join("; "), "GPU unavailable, scoring on CPU");

    #[cfg(not(any(feature = "metal", feature = "cuda")))]
    tracing::debug!("No GPU backend compiled, scoring on CPU");

    Device::Cpu
}

/// Short device label for logs and readiness output.
pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

