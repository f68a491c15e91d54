//! Auto-capture state machine.
//!
//! [`LivenessEngine`] owns all detection state for one capture session. It is
//! synchronous and clock-injected: the caller passes the frame or tick time
//! in, and the engine answers with a [`Directive`]. Only the photo capture
//! itself is performed outside, after which the caller reports back with
//! [`LivenessEngine::capture_succeeded`] or [`LivenessEngine::capture_failed`].

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::challenge::{select_random_challenge, Challenge};
use crate::config::EngineConfig;
use crate::evaluator::ChallengeEvaluator;
use crate::face::FaceObservation;
use crate::geometry::is_face_in_target_box;
use crate::status::Status;
use crate::throttle::FrameThrottle;

/// Why a manual capture request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    #[error("no face detected")]
    NoFace,
    #[error("multiple faces detected")]
    MultipleFaces,
    #[error("face is not inside the frame")]
    OutOfPosition,
    #[error("challenge not completed")]
    ChallengeIncomplete,
    #[error("face not stable yet")]
    NotStable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine is not active")]
    Inactive,
    #[error("a capture is already in progress")]
    CaptureInProgress,
    #[error("capture not ready: {0}")]
    NotReady(#[from] NotReady),
}

/// Coarse position in the capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No single qualifying face.
    Idle,
    /// Face present, challenge not satisfied this frame.
    Evaluating,
    /// Challenge satisfied, stable frame count below threshold.
    Stabilizing,
    CountingDown,
    /// Manual mode: stable, waiting for the user to press capture.
    ReadyToCapture,
    Capturing,
    Captured,
    Closed,
}

/// What the caller should do after feeding the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Directive {
    /// Frame or tick consumed, nothing to do.
    Continue,
    /// Frame dropped: engine inactive, capture in flight, or throttled.
    Skipped,
    /// Take the photo now. Issued at most once per in-flight capture.
    Capture,
}

/// Mutable per-session detection state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionState {
    /// Faces of the last processed frame that passed the target-box filter.
    pub faces: Vec<FaceObservation>,
    /// Exactly one qualifying face in the last processed frame.
    pub face_in_target_box: bool,
    pub challenge_completed: bool,
    pub stable_detection_count: u32,
    /// Countdown ticks remaining, 0 when idle.
    pub countdown: u32,
    pub is_capturing: bool,
}

pub struct LivenessEngine<R = StdRng> {
    config: EngineConfig,
    rng: R,
    throttle: FrameThrottle,
    evaluator: ChallengeEvaluator,
    challenge: Option<Challenge>,
    state: DetectionState,
    phase: Phase,
    status: Status,
    active: bool,
    next_tick_at: Option<Instant>,
    raw_face_count: usize,
}

impl LivenessEngine<StdRng> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng> LivenessEngine<R> {
    /// Build an inactive engine; call [`start`](Self::start) once the camera is ready.
    pub fn with_rng(config: EngineConfig, rng: R) -> Self {
        let evaluator = ChallengeEvaluator::new(config.blink, config.head_shake, config.smile_threshold);
        let throttle = FrameThrottle::new(config.frame_interval());
        Self {
            config,
            rng,
            throttle,
            evaluator,
            challenge: None,
            state: DetectionState::default(),
            phase: Phase::Idle,
            status: Status::Initializing,
            active: false,
            next_tick_at: None,
            raw_face_count: 0,
        }
    }

    /// Begin a fresh capture cycle with a newly selected random challenge.
    pub fn start(&mut self) {
        self.state = DetectionState::default();
        self.next_tick_at = None;
        self.raw_face_count = 0;
        self.throttle.reset();
        self.active = true;
        self.phase = Phase::Idle;
        self.select_random_challenge();
    }

    /// Replace the active challenge with a random one from the configured pool.
    ///
    /// Clears detector memory, stability and countdown so nothing carries over.
    pub fn select_random_challenge(&mut self) -> &Challenge {
        let challenge = select_random_challenge(&self.config.challenges, &mut self.rng);
        self.set_challenge(challenge)
    }

    /// Install a specific challenge, with the same resets as random selection.
    pub fn set_challenge(&mut self, challenge: Challenge) -> &Challenge {
        tracing::info!(kind = %challenge.kind, steps = challenge.sequence.len(), "challenge selected");
        self.evaluator.reset();
        self.reset_stability();
        self.state.challenge_completed = false;
        if matches!(
            self.phase,
            Phase::Evaluating | Phase::Stabilizing | Phase::CountingDown | Phase::ReadyToCapture
        ) {
            self.phase = Phase::Idle;
        }
        let action = challenge.next_action().unwrap_or(challenge.kind);
        self.set_status(Status::Instruction { action });
        self.challenge.insert(challenge)
    }

    /// Process one frame's worth of detected faces.
    pub fn on_frame(&mut self, faces: &[FaceObservation], now: Instant) -> Directive {
        if !self.active || self.state.is_capturing {
            return Directive::Skipped;
        }
        if !self.throttle.admit(now) {
            return Directive::Skipped;
        }

        let target = self.config.target_box;
        let policy = self.config.target_policy;
        self.raw_face_count = faces.len();
        self.state.faces = faces
            .iter()
            .filter(|face| is_face_in_target_box(&face.bounds, &target, &policy))
            .cloned()
            .collect();
        self.state.face_in_target_box = self.state.faces.len() == 1;

        if !self.state.face_in_target_box {
            self.state.challenge_completed = false;
            let status = self.face_problem();
            tracing::trace!(raw = self.raw_face_count, qualifying = self.state.faces.len(), "no single qualifying face");
            self.drop_to_idle(status);
            return Directive::Continue;
        }

        if self.challenge.is_none() {
            self.state.challenge_completed = false;
            self.drop_to_idle(Status::Initializing);
            return Directive::Continue;
        }

        let face = self.state.faces[0].clone();
        let Some(challenge) = self.challenge.as_mut() else {
            return Directive::Continue;
        };
        let satisfied = self.evaluator.evaluate(&face, challenge, now);
        let kind = challenge.kind;
        let pending = challenge.next_action().unwrap_or(kind);
        self.state.challenge_completed = satisfied;

        if !satisfied {
            if self.phase == Phase::CountingDown {
                tracing::debug!("challenge lost during countdown, cancelling");
            }
            self.reset_stability();
            self.phase = Phase::Evaluating;
            self.set_status(Status::Instruction { action: pending });
            return Directive::Continue;
        }

        // Stability is frozen while the countdown or the capture button is live
        if matches!(self.phase, Phase::CountingDown | Phase::ReadyToCapture) {
            return Directive::Continue;
        }

        self.state.stable_detection_count += 1;
        let threshold = self.config.stability.for_action(kind);
        tracing::trace!(count = self.state.stable_detection_count, threshold, "stable frame");

        if self.state.stable_detection_count < threshold {
            self.phase = Phase::Stabilizing;
            self.set_status(Status::HoldStill);
            return Directive::Continue;
        }

        self.on_stable(now)
    }

    fn on_stable(&mut self, now: Instant) -> Directive {
        if !self.config.auto_capture {
            self.phase = Phase::ReadyToCapture;
            self.set_status(Status::ReadyToCapture);
            return Directive::Continue;
        }

        if self.config.countdown_secs == 0 {
            return self.begin_capture();
        }

        self.state.countdown = self.config.countdown_secs;
        self.next_tick_at = Some(now + self.config.countdown_tick());
        self.phase = Phase::CountingDown;
        tracing::info!(ticks = self.state.countdown, "countdown started");
        self.set_status(Status::CountingDown {
            remaining: self.state.countdown,
        });
        Directive::Continue
    }

    /// Advance the countdown. Call at or after [`next_tick_at`](Self::next_tick_at).
    pub fn tick(&mut self, now: Instant) -> Directive {
        if !self.active || self.phase != Phase::CountingDown {
            return Directive::Continue;
        }
        let Some(due) = self.next_tick_at else {
            return Directive::Continue;
        };
        if now < due {
            return Directive::Continue;
        }

        if !(self.state.face_in_target_box && self.state.challenge_completed) {
            self.reset_stability();
            self.phase = Phase::Evaluating;
            return Directive::Continue;
        }

        self.state.countdown = self.state.countdown.saturating_sub(1);
        if self.state.countdown == 0 {
            if self.state.is_capturing {
                return Directive::Continue;
            }
            return self.begin_capture();
        }

        self.next_tick_at = Some(due + self.config.countdown_tick());
        self.set_status(Status::CountingDown {
            remaining: self.state.countdown,
        });
        Directive::Continue
    }

    /// Manual capture button. Re-validates the last processed frame before capturing.
    pub fn begin_manual_capture(&mut self) -> Result<(), EngineError> {
        if !self.active {
            return Err(EngineError::Inactive);
        }
        if self.state.is_capturing {
            return Err(EngineError::CaptureInProgress);
        }
        if !self.state.face_in_target_box {
            return Err(match self.face_problem() {
                Status::NoFace => NotReady::NoFace,
                Status::MultipleFaces => NotReady::MultipleFaces,
                _ => NotReady::OutOfPosition,
            }
            .into());
        }
        if !self.state.challenge_completed {
            return Err(NotReady::ChallengeIncomplete.into());
        }
        if !matches!(self.phase, Phase::ReadyToCapture | Phase::CountingDown) {
            return Err(NotReady::NotStable.into());
        }

        match self.begin_capture() {
            Directive::Capture => Ok(()),
            _ => Err(EngineError::CaptureInProgress),
        }
    }

    fn begin_capture(&mut self) -> Directive {
        if self.state.is_capturing {
            return Directive::Continue;
        }
        self.state.is_capturing = true;
        self.state.countdown = 0;
        self.next_tick_at = None;
        self.phase = Phase::Capturing;
        tracing::info!("capture triggered");
        self.set_status(Status::Capturing);
        Directive::Capture
    }

    /// The external capture returned a photo. Ends the cycle.
    ///
    /// Returns `false` if no capture was in flight (for instance the session
    /// was closed meanwhile); the result should then be discarded.
    pub fn capture_succeeded(&mut self) -> bool {
        if !self.state.is_capturing {
            tracing::debug!("capture result ignored, no capture in flight");
            return false;
        }
        self.state = DetectionState::default();
        self.next_tick_at = None;
        self.challenge = None;
        self.evaluator.reset();
        self.active = false;
        self.phase = Phase::Captured;
        self.set_status(Status::Captured);
        true
    }

    /// The external capture failed. Frame processing resumes; a fresh
    /// stable run is needed before the next automatic attempt.
    pub fn capture_failed(&mut self, reason: impl Into<String>) {
        if !self.state.is_capturing {
            return;
        }
        let reason = reason.into();
        tracing::warn!(%reason, "capture failed");
        self.state.is_capturing = false;
        self.reset_stability();
        self.phase = Phase::Evaluating;
        self.set_status(Status::CaptureFailed { reason });
    }

    /// Camera missing or permission denied. Fatal for this cycle.
    pub fn camera_unavailable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(%reason, "camera unavailable");
        self.shutdown();
        self.set_status(Status::CameraUnavailable { reason });
    }

    /// Cancel everything synchronously. No countdown or detector state survives.
    pub fn close(&mut self) {
        self.shutdown();
        self.set_status(Status::Closed);
    }

    fn shutdown(&mut self) {
        self.active = false;
        self.challenge = None;
        self.evaluator.reset();
        self.state = DetectionState::default();
        self.next_tick_at = None;
        self.raw_face_count = 0;
        self.throttle.reset();
        self.phase = Phase::Closed;
    }

    fn face_problem(&self) -> Status {
        let qualifying = self.state.faces.len();
        match self.raw_face_count {
            0 => Status::NoFace,
            _ if qualifying > 1 => Status::MultipleFaces,
            n if n > 1 && qualifying == 0 => Status::MultipleFaces,
            _ => Status::OutOfPosition,
        }
    }

    fn reset_stability(&mut self) {
        self.state.stable_detection_count = 0;
        self.state.countdown = 0;
        self.next_tick_at = None;
    }

    fn drop_to_idle(&mut self, status: Status) {
        self.reset_stability();
        self.phase = Phase::Idle;
        self.set_status(status);
    }

    fn set_status(&mut self, status: Status) {
        if self.status != status {
            tracing::debug!(status = %status, "status changed");
            self.status = status;
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When the next countdown tick is due, if a countdown is running.
    pub fn next_tick_at(&self) -> Option<Instant> {
        self.next_tick_at
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detector_memory_clear(&self) -> bool {
        self.evaluator.memory().is_clear()
    }
}
