//! facegate-core: liveness challenge engine for face-capture attendance.
//!
//! Feeds per-frame face detections through a target-box filter and an
//! active liveness challenge (blink, smile, head shake, look straight), and
//! decides when a photo should be taken. Camera, face detection and image
//! handling are supplied by the caller.

pub mod challenge;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod face;
pub mod geometry;
pub mod liveness;
pub mod status;
pub mod throttle;

pub use challenge::{select_random_challenge, Action, Challenge, ChallengePool};
pub use config::{EngineConfig, StabilityThresholds};
pub use engine::{DetectionState, Directive, EngineError, LivenessEngine, NotReady, Phase};
pub use evaluator::ChallengeEvaluator;
pub use face::FaceObservation;
pub use geometry::{is_face_in_target_box, Rect, TargetBoxPolicy};
pub use liveness::{BlinkConfig, BlinkDetector, DetectorMemory, HeadShakeConfig, HeadShakeDetector};
pub use status::{Severity, Status};
pub use throttle::FrameThrottle;
