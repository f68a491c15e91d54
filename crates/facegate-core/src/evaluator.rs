use std::time::Instant;

use crate::challenge::{Action, Challenge};
use crate::face::FaceObservation;
use crate::liveness::{smile_detected, BlinkConfig, DetectorMemory, HeadShakeConfig};

/// Evaluates a [`Challenge`] against the qualifying face of each frame.
#[derive(Debug, Clone)]
pub struct ChallengeEvaluator {
    memory: DetectorMemory,
    smile_threshold: f32,
}

impl ChallengeEvaluator {
    pub fn new(blink: BlinkConfig, head_shake: HeadShakeConfig, smile_threshold: f32) -> Self {
        Self {
            memory: DetectorMemory::new(blink, head_shake),
            smile_threshold,
        }
    }

    /// Returns `true` when the challenge is satisfied as of this frame.
    ///
    /// Single-action challenges re-run their detector every frame, so the
    /// action must keep holding (smile) or still be within its confirmation
    /// window (blink, head shake). Multi-action challenges only test the next
    /// pending action and record it once satisfied; completed actions are not
    /// re-checked.
    pub fn evaluate(&mut self, face: &FaceObservation, challenge: &mut Challenge, now: Instant) -> bool {
        if !challenge.is_double() {
            let satisfied = self.detect(challenge.kind, face, now);
            challenge.completed_actions.clear();
            if satisfied {
                challenge.completed_actions.push(challenge.kind);
            }
            return satisfied;
        }

        if let Some(next) = challenge.next_action() {
            if self.detect(next, face, now) {
                tracing::debug!(action = %next, "challenge step completed");
                challenge.completed_actions.push(next);
                // Each step needs its own fresh evidence
                self.memory.reset();
            }
        }

        challenge.is_complete()
    }

    fn detect(&mut self, action: Action, face: &FaceObservation, now: Instant) -> bool {
        match action {
            Action::LookStraight => true,
            Action::Smile => smile_detected(face, self.smile_threshold),
            Action::Blink => self.memory.blink.update(face, now),
            Action::HeadShake => self.memory.head_shake.update(face, now),
        }
    }

    pub fn reset(&mut self) {
        self.memory.reset();
    }

    pub fn memory(&self) -> &DetectorMemory {
        &self.memory
    }
}
