use std::fmt;

use serde::Serialize;

use crate::challenge::Action;

/// Color hint for rendering a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Live feedback reported to the camera UI.
///
/// When several conditions hold at once the engine reports the first that
/// applies in this order: capturing, face count, face position, pending
/// challenge action, countdown or ready.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    /// Waiting for the camera or for the first processed frame.
    Initializing,
    NoFace,
    MultipleFaces,
    OutOfPosition,
    /// Perform this action.
    Instruction { action: Action },
    /// Challenge satisfied, accumulating stable frames.
    HoldStill,
    CountingDown { remaining: u32 },
    /// Manual mode: the capture button is enabled.
    ReadyToCapture,
    Capturing,
    Captured,
    CaptureFailed { reason: String },
    CameraUnavailable { reason: String },
    Closed,
}

impl Status {
    pub fn severity(&self) -> Severity {
        match self {
            Status::Initializing | Status::Instruction { .. } | Status::Capturing | Status::Closed => {
                Severity::Info
            }
            Status::NoFace | Status::MultipleFaces | Status::OutOfPosition => Severity::Warning,
            Status::HoldStill
            | Status::CountingDown { .. }
            | Status::ReadyToCapture
            | Status::Captured => Severity::Success,
            Status::CaptureFailed { .. } | Status::CameraUnavailable { .. } => Severity::Error,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Initializing => f.write_str("Preparing camera..."),
            Status::NoFace => f.write_str("No face detected"),
            Status::MultipleFaces => f.write_str("Multiple faces detected, only one person please"),
            Status::OutOfPosition => f.write_str("Position your face inside the frame"),
            Status::Instruction { action } => f.write_str(action.instruction()),
            Status::HoldStill => f.write_str("Great, hold still"),
            Status::CountingDown { remaining } => write!(f, "Capturing in {remaining}..."),
            Status::ReadyToCapture => f.write_str("Ready, tap to capture"),
            Status::Capturing => f.write_str("Capturing..."),
            Status::Captured => f.write_str("Photo captured"),
            Status::CaptureFailed { reason } => write!(f, "Capture failed: {reason}"),
            Status::CameraUnavailable { reason } => write!(f, "Camera unavailable: {reason}"),
            Status::Closed => f.write_str("Camera closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Status::Instruction { action: Action::Blink }.message(),
            "Blink your eyes"
        );
        assert_eq!(Status::CountingDown { remaining: 1 }.message(), "Capturing in 1...");
        assert_eq!(Status::NoFace.severity(), Severity::Warning);
        assert_eq!(
            Status::CaptureFailed { reason: "busy".into() }.severity(),
            Severity::Error
        );
    }

    #[test]
    fn test_serializes_tagged() {
        let json = serde_json::to_string(&Status::CountingDown { remaining: 2 }).unwrap();
        assert_eq!(json, r#"{"status":"counting_down","remaining":2}"#);
    }
}
