use std::time::{Duration, Instant};

/// Minimum-interval gate for the frame feed.
///
/// The camera pipeline calls back at native frame rate; only frames arriving
/// at least `interval` after the last accepted one are processed. Skipped
/// frames are dropped, never queued.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Return `true` if a frame arriving at `now` should be processed.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }

    /// Forget the last accepted frame so the next one is admitted immediately.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_admitted() {
        let mut t = FrameThrottle::new(Duration::from_millis(200));
        assert!(t.admit(Instant::now()));
    }

    #[test]
    fn test_frames_inside_interval_dropped() {
        let mut t = FrameThrottle::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(t.admit(t0));
        assert!(!t.admit(t0 + Duration::from_millis(33)));
        assert!(!t.admit(t0 + Duration::from_millis(199)));
        assert!(t.admit(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_dropped_frames_do_not_extend_interval() {
        let mut t = FrameThrottle::new(Duration::from_millis(200));
        let t0 = Instant::now();
        t.admit(t0);
        t.admit(t0 + Duration::from_millis(150));
        assert!(t.admit(t0 + Duration::from_millis(210)));
    }

    #[test]
    fn test_reset_admits_next_frame() {
        let mut t = FrameThrottle::new(Duration::from_millis(200));
        let t0 = Instant::now();
        t.admit(t0);
        t.reset();
        assert!(t.admit(t0 + Duration::from_millis(1)));
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let mut t = FrameThrottle::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(t.admit(t0));
        assert!(t.admit(t0));
    }
}
