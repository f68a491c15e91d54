//! `facegate simulate`: replay a scripted frame feed on a synthetic clock.
//!
//! The script lists timestamped events (frames of face detections, capture
//! button presses, close/reopen). Countdown ticks fire automatically when
//! the synthetic clock passes them, and the capture function is simulated:
//! it fails `fail_captures` times, then returns a fixed path.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use facegate_core::{Action, Challenge, Directive, EngineConfig, FaceObservation, LivenessEngine, Status};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Frame {
        #[serde(default)]
        faces: Vec<FaceObservation>,
    },
    /// Manual capture button.
    Press,
    Close,
    Reopen,
}

#[derive(Debug, Deserialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

#[derive(Debug, Deserialize)]
pub struct Script {
    /// Force this action sequence instead of a random challenge.
    #[serde(default)]
    pub challenge: Option<Vec<Action>>,
    /// Number of simulated capture attempts that fail before one succeeds.
    #[serde(default)]
    pub fail_captures: usize,
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Serialize)]
pub struct Record {
    pub at_ms: u64,
    #[serde(flatten)]
    pub status: Status,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub challenge: Option<Vec<Action>>,
    pub records: Vec<Record>,
    pub capture_attempts: usize,
    pub captured: Option<String>,
}

pub struct Options {
    pub seed: Option<u64>,
    pub challenge: Option<Action>,
    pub manual: bool,
}

const CAPTURE_PATH: &str = "simulated-capture.jpg";

/// Run a script against a fresh engine and collect every status change.
pub fn simulate(config: EngineConfig, script: &Script, options: &Options) -> Report {
    let mut config = config;
    if options.manual {
        config.auto_capture = false;
    }

    let rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut engine = LivenessEngine::with_rng(config, rng);
    engine.start();

    let forced = match options.challenge {
        Some(action) => Some(Challenge::single(action)),
        None => script.challenge.clone().and_then(Challenge::from_sequence),
    };
    if let Some(challenge) = forced.clone() {
        engine.set_challenge(challenge);
    }

    let mut sim = Simulation {
        t0: Instant::now(),
        engine,
        fail_remaining: script.fail_captures,
        forced,
        report: Report {
            challenge: None,
            records: Vec::new(),
            capture_attempts: 0,
            captured: None,
        },
    };
    sim.report.challenge = sim.engine.challenge().map(|c| c.sequence.clone());
    sim.record(0);

    for step in &script.steps {
        sim.run_ticks_until(step.at_ms);
        sim.apply(step);
        sim.record(step.at_ms);
    }

    // Let a running countdown finish
    while let Some(due) = sim.engine.next_tick_at() {
        let at_ms = sim.offset_ms(due);
        sim.tick(at_ms);
    }

    sim.report
}

struct Simulation {
    t0: Instant,
    engine: LivenessEngine<StdRng>,
    fail_remaining: usize,
    forced: Option<Challenge>,
    report: Report,
}

impl Simulation {
    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    fn offset_ms(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(self.t0).as_millis() as u64
    }

    fn run_ticks_until(&mut self, ms: u64) {
        let limit = self.at(ms);
        while let Some(due) = self.engine.next_tick_at() {
            if due > limit {
                break;
            }
            let at_ms = self.offset_ms(due);
            self.tick(at_ms);
        }
    }

    fn tick(&mut self, at_ms: u64) {
        let directive = self.engine.tick(self.at(at_ms));
        self.record(at_ms);
        self.handle_directive(directive, at_ms);
    }

    fn apply(&mut self, step: &ScriptStep) {
        let now = self.at(step.at_ms);
        match &step.event {
            ScriptEvent::Frame { faces } => {
                let directive = self.engine.on_frame(faces, now);
                self.handle_directive(directive, step.at_ms);
            }
            ScriptEvent::Press => match self.engine.begin_manual_capture() {
                Ok(()) => self.handle_directive(Directive::Capture, step.at_ms),
                Err(e) => tracing::info!(at_ms = step.at_ms, error = %e, "capture press rejected"),
            },
            ScriptEvent::Close => self.engine.close(),
            ScriptEvent::Reopen => {
                self.engine.start();
                if let Some(challenge) = self.forced.clone() {
                    self.engine.set_challenge(challenge);
                }
            }
        }
    }

    fn handle_directive(&mut self, directive: Directive, at_ms: u64) {
        if directive != Directive::Capture {
            return;
        }
        self.record(at_ms);
        self.report.capture_attempts += 1;
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            self.engine.capture_failed("simulated camera failure");
        } else if self.engine.capture_succeeded() {
            self.report.captured = Some(CAPTURE_PATH.to_string());
        }
        self.record(at_ms);
    }

    fn record(&mut self, at_ms: u64) {
        let status = self.engine.status();
        if self.report.records.last().is_some_and(|r| &r.status == status) {
            return;
        }
        self.report.records.push(Record {
            at_ms,
            status: status.clone(),
            message: status.message(),
        });
    }
}

pub fn load_script(path: &Path) -> Result<Script> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid script {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::Rect;

    const BLINK_SCRIPT: &str = include_str!("../scripts/blink.json");

    fn config() -> EngineConfig {
        EngineConfig {
            target_box: Rect::new(0.0, 0.0, 100.0, 100.0),
            ..EngineConfig::default()
        }
    }

    fn options() -> Options {
        Options {
            seed: Some(1),
            challenge: None,
            manual: false,
        }
    }

    fn messages(report: &Report) -> Vec<&str> {
        report.records.iter().map(|r| r.message.as_str()).collect()
    }

    #[test]
    fn test_blink_script_captures() {
        let script: Script = serde_json::from_str(BLINK_SCRIPT).unwrap();
        let report = simulate(config(), &script, &options());

        assert_eq!(report.challenge, Some(vec![Action::Blink]));
        assert_eq!(report.capture_attempts, 1);
        assert_eq!(report.captured.as_deref(), Some(CAPTURE_PATH));
        assert_eq!(
            messages(&report),
            vec![
                "Blink your eyes",
                "No face detected",
                "Blink your eyes",
                "Great, hold still",
                "Capturing in 1...",
                "Capturing...",
                "Photo captured",
            ]
        );
    }

    #[test]
    fn test_failed_capture_is_retried_on_next_stable_run() {
        let script: Script = serde_json::from_str(
            r#"{
                "challenge": ["smile"],
                "fail_captures": 1,
                "steps": [
                    {"at_ms": 0, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}, "smiling_probability": 0.9}]},
                    {"at_ms": 200, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}, "smiling_probability": 0.9}]},
                    {"at_ms": 1400, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}, "smiling_probability": 0.9}]},
                    {"at_ms": 1600, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}, "smiling_probability": 0.9}]}
                ]
            }"#,
        )
        .unwrap();
        let report = simulate(config(), &script, &options());
        assert_eq!(report.capture_attempts, 2);
        assert!(report.captured.is_some());
        assert!(messages(&report).contains(&"Capture failed: simulated camera failure"));
    }

    #[test]
    fn test_manual_press_before_ready_is_rejected() {
        let script: Script = serde_json::from_str(
            r#"{
                "challenge": ["look_straight"],
                "steps": [
                    {"at_ms": 0, "event": "press"},
                    {"at_ms": 0, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}}]},
                    {"at_ms": 200, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}}]},
                    {"at_ms": 400, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}}]},
                    {"at_ms": 500, "event": "press"}
                ]
            }"#,
        )
        .unwrap();
        let opts = Options {
            manual: true,
            ..options()
        };
        let report = simulate(config(), &script, &opts);
        assert_eq!(report.capture_attempts, 1);
        assert!(messages(&report).contains(&"Ready, tap to capture"));
    }

    #[test]
    fn test_close_stops_countdown() {
        let script: Script = serde_json::from_str(
            r#"{
                "challenge": ["smile"],
                "steps": [
                    {"at_ms": 0, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}, "smiling_probability": 0.9}]},
                    {"at_ms": 200, "event": "frame", "faces": [{"bounds": {"x": 20, "y": 20, "width": 60, "height": 60}, "smiling_probability": 0.9}]},
                    {"at_ms": 600, "event": "close"}
                ]
            }"#,
        )
        .unwrap();
        let report = simulate(config(), &script, &options());
        assert_eq!(report.capture_attempts, 0);
        assert_eq!(messages(&report).last(), Some(&"Camera closed"));
    }
}
