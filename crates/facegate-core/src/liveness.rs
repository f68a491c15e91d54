//! Active liveness detectors driven by per-frame face classification.
//!
//! A printed photo or a phone screen held up to the camera can satisfy a
//! "face present" check indefinitely. Asking the user to perform a prompted
//! action (blink, smile, shake their head) and confirming it from the
//! detector's eye, smile and yaw estimates raises the bar to a live subject.
//!
//! Each detector consumes one [`FaceObservation`] at a time together with the
//! frame timestamp and keeps whatever short-lived memory it needs. Missing or
//! non-finite classifier outputs never error; they count as "not satisfied".
//!
//! # Threat Coverage
//!
//! - **Blocks:** Static photographs, frozen screenshots.
//! - **Does not block:** Video replay of someone performing the same action,
//!   3D masks with articulated eyelids.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::face::FaceObservation;

/// Default smile probability a face must exceed to count as smiling.
pub const DEFAULT_SMILE_THRESHOLD: f32 = 0.7;

/// Tuning for [`BlinkDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Both eye-open probabilities below this mark the eyes as closed.
    pub closed_threshold: f32,
    /// Both eye-open probabilities above this mark the eyes as open.
    pub open_threshold: f32,
    /// Shortest closed-to-open duration accepted as a deliberate blink (inclusive).
    pub min_duration_ms: u64,
    /// Longest closed-to-open duration accepted as a deliberate blink (inclusive).
    pub max_duration_ms: u64,
    /// How long a confirmed blink keeps reporting success.
    pub confirmation_hold_ms: u64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            closed_threshold: 0.3,
            open_threshold: 0.8,
            min_duration_ms: 100,
            max_duration_ms: 800,
            confirmation_hold_ms: 3000,
        }
    }
}

/// Two-phase blink detector: eyes must close, then reopen within a time band.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    config: BlinkConfig,
    eye_closed_at: Option<Instant>,
    confirmed_until: Option<Instant>,
}

impl BlinkDetector {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            eye_closed_at: None,
            confirmed_until: None,
        }
    }

    /// Feed one observation. Returns `true` while a blink confirmation is live.
    pub fn update(&mut self, face: &FaceObservation, now: Instant) -> bool {
        if let Some(until) = self.confirmed_until {
            if now < until {
                return true;
            }
            // Confirmation expired: a fresh blink is required
            self.reset();
        }

        let Some((left, right)) = face.eye_open_probabilities() else {
            return false;
        };

        let closed = left < self.config.closed_threshold && right < self.config.closed_threshold;
        let open = left > self.config.open_threshold && right > self.config.open_threshold;

        if closed {
            if self.eye_closed_at.is_none() {
                self.eye_closed_at = Some(now);
            }
            return false;
        }

        if open {
            if let Some(closed_at) = self.eye_closed_at.take() {
                let duration = now.saturating_duration_since(closed_at);
                let min = Duration::from_millis(self.config.min_duration_ms);
                let max = Duration::from_millis(self.config.max_duration_ms);

                if duration >= min && duration <= max {
                    tracing::debug!(duration_ms = duration.as_millis() as u64, "blink confirmed");
                    self.confirmed_until =
                        Some(now + Duration::from_millis(self.config.confirmation_hold_ms));
                    return true;
                }

                tracing::trace!(
                    duration_ms = duration.as_millis() as u64,
                    "eye closure outside blink band, discarded"
                );
            }
        }

        false
    }

    pub fn is_confirmed(&self, now: Instant) -> bool {
        self.confirmed_until.is_some_and(|until| now < until)
    }

    pub fn reset(&mut self) {
        self.eye_closed_at = None;
        self.confirmed_until = None;
    }
}

/// Tuning for [`HeadShakeDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadShakeConfig {
    /// Sliding window of yaw samples considered.
    pub window_ms: u64,
    /// Yaw magnitude (degrees) beyond which the head counts as turned.
    pub yaw_threshold_deg: f32,
    /// Left/right direction changes needed inside the window.
    pub min_direction_changes: usize,
    /// Samples that must be in the window before a shake can be confirmed.
    pub min_samples: usize,
    /// How long a confirmed shake keeps reporting success.
    pub confirmation_hold_ms: u64,
}

impl Default for HeadShakeConfig {
    fn default() -> Self {
        Self {
            window_ms: 1500,
            yaw_threshold_deg: 10.0,
            min_direction_changes: 3,
            min_samples: 6,
            confirmation_hold_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YawDirection {
    Left,
    Right,
    Center,
}

/// Head-shake detector over a sliding window of yaw samples.
#[derive(Debug, Clone)]
pub struct HeadShakeDetector {
    config: HeadShakeConfig,
    history: VecDeque<(Instant, f32)>,
    confirmed_until: Option<Instant>,
}

impl HeadShakeDetector {
    pub fn new(config: HeadShakeConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            confirmed_until: None,
        }
    }

    /// Feed one observation. Returns `true` while a shake confirmation is live.
    pub fn update(&mut self, face: &FaceObservation, now: Instant) -> bool {
        if let Some(until) = self.confirmed_until {
            if now < until {
                return true;
            }
            self.reset();
        }

        let Some(yaw) = face.yaw() else {
            return false;
        };

        self.history.push_back((now, yaw));
        let window = Duration::from_millis(self.config.window_ms);
        while let Some(&(ts, _)) = self.history.front() {
            if now.saturating_duration_since(ts) > window {
                self.history.pop_front();
            } else {
                break;
            }
        }

        if self.history.len() < self.config.min_samples {
            return false;
        }

        let changes = self.direction_changes();
        if changes >= self.config.min_direction_changes {
            tracing::debug!(changes, samples = self.history.len(), "head shake confirmed");
            self.confirmed_until = Some(now + Duration::from_millis(self.config.confirmation_hold_ms));
            return true;
        }

        false
    }

    /// Count left/right flips between consecutive non-center samples.
    fn direction_changes(&self) -> usize {
        let directions: Vec<YawDirection> = self
            .history
            .iter()
            .map(|&(_, yaw)| self.classify(yaw))
            .filter(|d| *d != YawDirection::Center)
            .collect();

        directions.windows(2).filter(|pair| pair[0] != pair[1]).count()
    }

    fn classify(&self, yaw: f32) -> YawDirection {
        if yaw < -self.config.yaw_threshold_deg {
            YawDirection::Left
        } else if yaw > self.config.yaw_threshold_deg {
            YawDirection::Right
        } else {
            YawDirection::Center
        }
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.confirmed_until = None;
    }
}

/// Per-frame smile check. No memory.
pub fn smile_detected(face: &FaceObservation, threshold: f32) -> bool {
    face.smile().unwrap_or(0.0) > threshold
}

/// Detector memory that must not leak from one challenge to the next.
#[derive(Debug, Clone)]
pub struct DetectorMemory {
    pub blink: BlinkDetector,
    pub head_shake: HeadShakeDetector,
}

impl DetectorMemory {
    pub fn new(blink: BlinkConfig, head_shake: HeadShakeConfig) -> Self {
        Self {
            blink: BlinkDetector::new(blink),
            head_shake: HeadShakeDetector::new(head_shake),
        }
    }

    pub fn reset(&mut self) {
        self.blink.reset();
        self.head_shake.reset();
    }

    pub fn is_clear(&self) -> bool {
        self.blink.eye_closed_at.is_none()
            && self.blink.confirmed_until.is_none()
            && self.head_shake.history.is_empty()
            && self.head_shake.confirmed_until.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn eyes(left: f32, right: f32) -> FaceObservation {
        FaceObservation::new(Rect::new(0.0, 0.0, 100.0, 100.0)).with_eyes(left, right)
    }

    fn yaw(deg: f32) -> FaceObservation {
        FaceObservation::new(Rect::new(0.0, 0.0, 100.0, 100.0)).with_yaw(deg)
    }

    fn blink_after(duration_ms: u64) -> bool {
        let mut d = BlinkDetector::new(BlinkConfig::default());
        let t0 = Instant::now();
        assert!(!d.update(&eyes(0.1, 0.1), t0));
        d.update(&eyes(0.95, 0.95), t0 + Duration::from_millis(duration_ms))
    }

    #[test]
    fn test_blink_duration_bounds_inclusive() {
        assert!(blink_after(100));
        assert!(blink_after(800));
    }

    #[test]
    fn test_blink_outside_band_rejected() {
        assert!(!blink_after(99));
        assert!(!blink_after(801));
    }

    #[test]
    fn test_blink_closed_timestamp_kept_from_first_closed_frame() {
        let mut d = BlinkDetector::new(BlinkConfig::default());
        let t0 = Instant::now();
        d.update(&eyes(0.1, 0.1), t0);
        d.update(&eyes(0.05, 0.1), t0 + Duration::from_millis(600));
        // 900ms since the first closed frame: too slow
        assert!(!d.update(&eyes(0.9, 0.9), t0 + Duration::from_millis(900)));
    }

    #[test]
    fn test_blink_requires_both_eyes() {
        let mut d = BlinkDetector::new(BlinkConfig::default());
        let t0 = Instant::now();
        d.update(&eyes(0.1, 0.9), t0);
        assert!(!d.update(&eyes(0.9, 0.9), t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_blink_confirmation_holds_then_expires() {
        let mut d = BlinkDetector::new(BlinkConfig::default());
        let t0 = Instant::now();
        d.update(&eyes(0.1, 0.1), t0);
        let t1 = t0 + Duration::from_millis(200);
        assert!(d.update(&eyes(0.9, 0.9), t1));

        // Eye state irrelevant while confirmed
        assert!(d.update(&eyes(0.1, 0.1), t1 + Duration::from_millis(1000)));
        assert!(d.is_confirmed(t1 + Duration::from_millis(2999)));

        // After the hold a new blink is needed
        assert!(!d.update(&eyes(0.9, 0.9), t1 + Duration::from_millis(3000)));
        assert!(!d.is_confirmed(t1 + Duration::from_millis(3000)));
    }

    #[test]
    fn test_blink_missing_probabilities_not_satisfied() {
        let mut d = BlinkDetector::new(BlinkConfig::default());
        let face = FaceObservation::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(!d.update(&face, Instant::now()));

        let mut nan = eyes(0.1, 0.1);
        nan.left_eye_open_probability = Some(f32::NAN);
        assert!(!d.update(&nan, Instant::now()));
    }

    fn feed_yaw(d: &mut HeadShakeDetector, t0: Instant, yaws: &[f32]) -> bool {
        let mut last = false;
        for (i, y) in yaws.iter().enumerate() {
            last = d.update(&yaw(*y), t0 + Duration::from_millis(i as u64 * 200));
        }
        last
    }

    #[test]
    fn test_head_shake_two_changes_not_confirmed() {
        let mut d = HeadShakeDetector::new(HeadShakeConfig::default());
        assert!(!feed_yaw(&mut d, Instant::now(), &[-20.0, -20.0, 20.0, 20.0, -20.0, -20.0]));
    }

    #[test]
    fn test_head_shake_three_changes_confirmed() {
        let mut d = HeadShakeDetector::new(HeadShakeConfig::default());
        assert!(feed_yaw(&mut d, Instant::now(), &[-20.0, -20.0, 20.0, -20.0, 20.0, 20.0]));
    }

    #[test]
    fn test_head_shake_center_samples_ignored_for_changes() {
        let mut d = HeadShakeDetector::new(HeadShakeConfig::default());
        // L C R C L C R : three flips once center is dropped
        assert!(feed_yaw(&mut d, Instant::now(), &[-15.0, 0.0, 15.0, 2.0, -15.0, -3.0, 15.0]));
    }

    #[test]
    fn test_head_shake_needs_min_samples() {
        let mut d = HeadShakeDetector::new(HeadShakeConfig::default());
        // Four flips but only five samples
        assert!(!feed_yaw(&mut d, Instant::now(), &[-20.0, 20.0, -20.0, 20.0, -20.0]));
    }

    #[test]
    fn test_head_shake_window_drops_old_samples() {
        let mut d = HeadShakeDetector::new(HeadShakeConfig::default());
        let t0 = Instant::now();
        for i in 0..6u64 {
            d.update(&yaw(-20.0), t0 + Duration::from_millis(i * 100));
        }
        // 2s later everything old falls out of the 1.5s window
        d.update(&yaw(20.0), t0 + Duration::from_millis(2600));
        assert_eq!(d.sample_count(), 1);
    }

    #[test]
    fn test_head_shake_confirmation_expires_and_clears_history() {
        let mut d = HeadShakeDetector::new(HeadShakeConfig::default());
        let t0 = Instant::now();
        assert!(feed_yaw(&mut d, t0, &[-20.0, 20.0, -20.0, 20.0, -20.0, 20.0]));
        let confirmed_at = t0 + Duration::from_millis(1000);
        assert!(d.update(&yaw(0.0), confirmed_at + Duration::from_millis(2000)));
        assert!(!d.update(&yaw(0.0), confirmed_at + Duration::from_millis(3000)));
        assert_eq!(d.sample_count(), 1);
    }

    #[test]
    fn test_smile_threshold_strict() {
        let base = FaceObservation::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(smile_detected(&base.clone().with_smile(0.71), DEFAULT_SMILE_THRESHOLD));
        assert!(!smile_detected(&base.clone().with_smile(0.7), DEFAULT_SMILE_THRESHOLD));
        assert!(!smile_detected(&base, DEFAULT_SMILE_THRESHOLD));
    }

    #[test]
    fn test_memory_reset_clears_everything() {
        let mut m = DetectorMemory::new(BlinkConfig::default(), HeadShakeConfig::default());
        let t0 = Instant::now();
        m.blink.update(&eyes(0.1, 0.1), t0);
        m.head_shake.update(&yaw(20.0), t0);
        assert!(!m.is_clear());
        m.reset();
        assert!(m.is_clear());
    }
}
