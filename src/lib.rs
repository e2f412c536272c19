pub mod calibration;
pub mod capture;
pub mod control;
pub mod publish;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Device path; a `stub://` scheme selects the synthetic source
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps_high: u32,
    pub fps_low: u32,
    pub buffer_count: u32,
    /// Logical sensor identifier stamped on every frame
    pub frame_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Calibration profile name, used as the saved file stem
    pub profile: String,
    /// Directory intrinsic calibration files are written to
    pub dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                device: "/dev/video0".into(),
                width: 640,
                height: 480,
                fps_high: 30,
                fps_low: 15,
                buffer_count: 4,
                frame_id: "camera_optical_frame".into(),
            },
            calibration: CalibrationConfig {
                profile: "baseline".into(),
                dir: "config/calibration/camera_intrinsic".into(),
            },
        }
    }
}
