use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::challenge::{Action, ChallengePool};
use crate::geometry::{Rect, TargetBoxPolicy};
use crate::liveness::{BlinkConfig, HeadShakeConfig, DEFAULT_SMILE_THRESHOLD};

/// Consecutive satisfied frames required before capture, per challenge kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    pub look_straight: u32,
    pub blink: u32,
    pub smile: u32,
    /// One-shot gesture: a single confirmed frame is enough.
    pub head_shake: u32,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            look_straight: 3,
            blink: 2,
            smile: 2,
            head_shake: 1,
        }
    }
}

impl StabilityThresholds {
    pub fn for_action(&self, action: Action) -> u32 {
        let frames = match action {
            Action::LookStraight => self.look_straight,
            Action::Blink => self.blink,
            Action::Smile => self.smile,
            Action::HeadShake => self.head_shake,
        };
        frames.max(1)
    }
}

/// Engine configuration. Every field has a default; a partial TOML file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capture automatically after the countdown; otherwise enable a capture button.
    pub auto_capture: bool,
    /// Capture box in frame coordinates.
    pub target_box: Rect,
    pub target_policy: TargetBoxPolicy,
    /// Minimum interval between processed frames.
    pub frame_interval_ms: u64,
    /// Countdown length in ticks. Zero captures as soon as the face is stable.
    pub countdown_secs: u32,
    /// Duration of one countdown tick.
    pub countdown_tick_ms: u64,
    pub stability: StabilityThresholds,
    pub smile_threshold: f32,
    pub blink: BlinkConfig,
    pub head_shake: HeadShakeConfig,
    pub challenges: ChallengePool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_capture: true,
            target_box: Rect::centered(480.0, 640.0, 0.75, 0.6),
            target_policy: TargetBoxPolicy::default(),
            frame_interval_ms: 200,
            countdown_secs: 1,
            countdown_tick_ms: 1000,
            stability: StabilityThresholds::default(),
            smile_threshold: DEFAULT_SMILE_THRESHOLD,
            blink: BlinkConfig::default(),
            head_shake: HeadShakeConfig::default(),
            challenges: ChallengePool::default(),
        }
    }
}

impl EngineConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }
}
