//! Intrinsic calibration persistence.
//!
//! The capture core only accepts a save request and forwards it to a
//! [`CalibrationStore`]; the store decides the on-disk format. Failures are
//! reported back to the requester and never touch the capture loop.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("calibration write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("calibration encoding failed: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Intrinsic camera parameters, as produced by a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub camera_name: String,
    pub image_width: u32,
    pub image_height: u32,
    pub distortion_model: String,
    /// Distortion coefficients (model-dependent length, 1xN)
    pub distortion_coefficients: Vec<f64>,
    /// 3x3 camera matrix, row-major
    pub camera_matrix: [f64; 9],
    /// 3x3 rectification matrix, row-major
    pub rectification_matrix: [f64; 9],
    /// 3x4 projection matrix, row-major
    pub projection_matrix: [f64; 12],
}

/// Outcome reported to the requester.
#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
}

/// Where calibration profiles end up. The core does not care about the
/// serialization format behind this seam.
pub trait CalibrationStore {
    /// Persist `intrinsics` under `name`, returning a human-readable
    /// description of the destination.
    fn save(&self, name: &str, intrinsics: &CameraIntrinsics) -> Result<String, PersistenceError>;
}

/// Stores each profile as `<dir>/<name>.toml`, creating the directory on
/// first use.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CalibrationStore for FileStore {
    fn save(&self, name: &str, intrinsics: &CameraIntrinsics) -> Result<String, PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{name}.toml"));
        let encoded = toml::to_string_pretty(intrinsics)?;
        fs::write(&path, encoded)?;
        Ok(path.display().to_string())
    }
}

/// Handle one calibration-save request, synchronously. Failures are local:
/// they surface as `success = false` with a non-empty message.
pub fn save_intrinsics(
    store: &dyn CalibrationStore,
    name: &str,
    intrinsics: &CameraIntrinsics,
) -> SaveResponse {
    match store.save(name, intrinsics) {
        Ok(dest) => {
            info!("Saved calibration '{name}' to {dest}");
            SaveResponse {
                success: true,
                message: format!("Wrote calibration to {dest}"),
            }
        }
        Err(e) => {
            warn!("Calibration save '{name}' failed: {e}");
            SaveResponse {
                success: false,
                message: e.to_string(),
            }
        }
    }
}
