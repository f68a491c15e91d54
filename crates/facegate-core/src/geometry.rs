//! Target-region geometry.
//!
//! The camera UI draws a capture box on screen; a face only counts toward the
//! liveness challenge when it sits mostly inside that box and has a plausible
//! size for the distance we expect the user to hold the phone at.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in frame coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box of `width_ratio` x `height_ratio` of the frame, centered in it.
    pub fn centered(frame_width: f32, frame_height: f32, width_ratio: f32, height_ratio: f32) -> Self {
        let width = frame_width * width_ratio;
        let height = frame_height * height_ratio;
        Self {
            x: (frame_width - width) / 2.0,
            y: (frame_height - height) / 2.0,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Overlapping region of two rectangles, `None` when they do not touch.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Strictness knobs for [`is_face_in_target_box`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetBoxPolicy {
    /// Minimum share of the face's own area that must lie inside the box.
    pub min_overlap_ratio: f32,
    /// Face width/height must each be at least this fraction of the box.
    pub min_size_ratio: f32,
    /// Face width/height must each be at most this fraction of the box.
    pub max_size_ratio: f32,
    /// Margin around the box, as a fraction of its size, that the face center may stray into.
    pub center_tolerance: f32,
}

impl Default for TargetBoxPolicy {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.4,
            min_size_ratio: 0.3,
            max_size_ratio: 1.5,
            center_tolerance: 0.3,
        }
    }
}

/// Decide whether a detected face is positioned inside the capture box.
///
/// All of the following must hold:
/// - at least `min_overlap_ratio` of the face area intersects the box,
/// - the face is neither too small (far) nor too large (close) relative to the box,
/// - the face center lies within the box grown by `center_tolerance` on each axis.
///
/// Degenerate faces (zero or negative area, non-finite coordinates) never qualify.
pub fn is_face_in_target_box(face: &Rect, target: &Rect, policy: &TargetBoxPolicy) -> bool {
    let face_area = face.area();
    if !face_area.is_finite() || face_area <= 0.0 || target.area() <= 0.0 {
        return false;
    }

    let Some(overlap) = face.intersection(target) else {
        return false;
    };

    if overlap.area() / face_area < policy.min_overlap_ratio {
        return false;
    }

    let width_ratio = face.width / target.width;
    let height_ratio = face.height / target.height;
    if width_ratio < policy.min_size_ratio || height_ratio < policy.min_size_ratio {
        return false;
    }
    if width_ratio > policy.max_size_ratio || height_ratio > policy.max_size_ratio {
        return false;
    }

    let (cx, cy) = face.center();
    let margin_x = target.width * policy.center_tolerance;
    let margin_y = target.height * policy.center_tolerance;

    cx >= target.x - margin_x
        && cx <= target.right() + margin_x
        && cy >= target.y - margin_y
        && cy <= target.bottom() + margin_y
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

    fn check(face: Rect) -> bool {
        is_face_in_target_box(&face, &TARGET, &TargetBoxPolicy::default())
    }

    #[test]
    fn test_centered_face_accepted() {
        assert!(check(Rect::new(20.0, 20.0, 60.0, 60.0)));
    }

    #[test]
    fn test_disjoint_face_rejected() {
        assert!(!check(Rect::new(200.0, 200.0, 60.0, 60.0)));
    }

    #[test]
    fn test_low_overlap_rejected() {
        // 35 of 100 columns inside the box: 35% of the face area
        assert!(!check(Rect::new(65.0, 0.0, 100.0, 100.0)));
    }

    #[test]
    fn test_overlap_above_threshold_accepted() {
        // 45% of the face area inside, full-height, center within tolerance
        assert!(check(Rect::new(55.0, 0.0, 100.0, 100.0)));
    }

    #[test]
    fn test_too_small_face_rejected() {
        assert!(!check(Rect::new(45.0, 45.0, 20.0, 20.0)));
    }

    #[test]
    fn test_too_large_face_rejected() {
        assert!(!check(Rect::new(-30.0, -30.0, 160.0, 160.0)));
    }

    #[test]
    fn test_size_bounds_inclusive() {
        assert!(check(Rect::new(35.0, 35.0, 30.0, 30.0)));
        assert!(check(Rect::new(-25.0, -25.0, 150.0, 150.0)));
    }

    #[test]
    fn test_center_outside_tolerance_rejected() {
        // Tall face mostly overlapping but center pushed below box + 30% margin
        let policy = TargetBoxPolicy {
            min_overlap_ratio: 0.1,
            max_size_ratio: 3.0,
            ..TargetBoxPolicy::default()
        };
        let face = Rect::new(20.0, 80.0, 60.0, 120.0);
        assert!(is_face_in_target_box(&Rect::new(20.0, 20.0, 60.0, 120.0), &TARGET, &policy));
        assert!(!is_face_in_target_box(&face, &TARGET, &policy));
    }

    #[test]
    fn test_degenerate_face_rejected() {
        assert!(!check(Rect::new(20.0, 20.0, 0.0, 60.0)));
        assert!(!check(Rect::new(f32::NAN, 20.0, 60.0, 60.0)));
    }

    #[test]
    fn test_centered_constructor() {
        let r = Rect::centered(480.0, 640.0, 0.75, 0.6);
        assert_eq!(r.width, 360.0);
        assert_eq!(r.x, 60.0);
        assert_eq!(r.y, 128.0);
    }
}
