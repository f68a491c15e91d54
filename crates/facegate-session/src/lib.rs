//! facegate-session: async capture session around the liveness engine.
//!
//! A single task owns the [`facegate_core::LivenessEngine`] and serializes
//! everything that mutates it: frames pushed by the camera pipeline, countdown
//! ticks, manual capture requests, capture completions, close and reopen.
//! Status changes are published on a `watch` channel for the UI.

pub mod capture;
pub mod config;
pub mod session;

pub use capture::{CaptureError, CapturedPhoto, PhotoCapture};
pub use config::{load_engine_config, Config, ConfigError};
pub use session::{spawn_session, SessionError, SessionEvent, SessionEvents, SessionHandle};
