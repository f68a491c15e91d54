use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No device or no permission. Fatal for the session.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("camera not ready")]
    NotReady,
    #[error("capture returned no image")]
    NoImage,
    #[error("capture failed: {0}")]
    Failed(String),
}

impl CaptureError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::CameraUnavailable(_))
    }
}

/// A photo written by the camera layer (already post-processed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

impl CapturedPhoto {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            captured_at: Utc::now(),
        }
    }
}

/// Camera layer contract used by the session.
///
/// The session calls [`capture_photo`](Self::capture_photo) at most once per
/// cycle and waits for it before another call can happen.
pub trait PhotoCapture: Send + Sync + 'static {
    /// Checked once when the session starts.
    fn ensure_ready(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn capture_photo(&self) -> impl Future<Output = Result<CapturedPhoto, CaptureError>> + Send;
}
