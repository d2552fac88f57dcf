//! Hinge-angle estimation from the pad and keyboard accelerometers
//!
//! Raw samples are scaled to m/s² and renormalized so only the direction of
//! each gravity vector matters. The fold decision compares the angle between
//! the two vectors against a fixed threshold, and is only re-evaluated once
//! the keyboard-side vector has moved enough to rule out sensor noise.

use tracing::debug;

use crate::protocol::AccelSample;

/// Standard gravity, also the magnitude every vector is renormalized to
pub const GRAVITY: f64 = 9.8;
/// Raw-axis scale factor (device units to m/s²)
pub const AXIS_SCALE: f64 = GRAVITY / 256.0;
/// Hinge angle at or beyond which the keyboard counts as folded away
pub const FOLD_THRESHOLD_DEG: f64 = 120.0;
/// Squared keyboard-vector delta below which a sample is treated as noise
pub const REEVAL_DELTA_SQ: f64 = 0.04;

/// 3-axis acceleration vector in m/s²
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn magnitude(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Squared distance to another vector
    pub fn delta_sq(self, other: Vector3) -> f64 {
        let d = Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z);
        d.dot(d)
    }

    /// Rescale to gravity magnitude, keeping only the direction. A zero
    /// vector stays zero.
    pub fn renormalized(self) -> Vector3 {
        let m = self.magnitude();
        if m == 0.0 {
            return Vector3::default();
        }
        let k = GRAVITY / m;
        Vector3::new(self.x * k, self.y * k, self.z * k)
    }
}

/// Convert a raw keyboard-side sample to a gravity-normalized vector.
///
/// Y and Z are sign-inverted relative to X to match the keyboard's mounting
/// orientation.
pub fn vector_from_sample(sample: AccelSample) -> Vector3 {
    Vector3::new(
        f64::from(sample.x) * AXIS_SCALE,
        -f64::from(sample.y) * AXIS_SCALE,
        -f64::from(sample.z) * AXIS_SCALE,
    )
    .renormalized()
}

/// Angle between two vectors in degrees.
///
/// The normalized dot product is clamped to [-1, 1] before the arccosine so
/// floating-point drift cannot leave the domain. Returns 0 if either vector
/// has zero magnitude.
pub fn estimate_angle(a: Vector3, b: Vector3) -> f64 {
    let (ma, mb) = (a.magnitude(), b.magnitude());
    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }
    let cos = (a.dot(b) / (ma * mb)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Fold-state evaluator with a persistent last-sample baseline.
///
/// The baseline survives across invocations so the noise gate is a genuine
/// frame-to-frame delta; the first sample always evaluates.
#[derive(Debug, Default)]
pub struct FoldTracker {
    last_eval: Option<Vector3>,
}

impl FoldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a keyboard/pad vector pair. Returns `Some(folded)` when the
    /// keyboard vector moved past the noise gate and the angle was
    /// re-evaluated, `None` otherwise.
    pub fn update(&mut self, keyboard: Vector3, pad: Vector3) -> Option<bool> {
        if let Some(last) = self.last_eval {
            if keyboard.delta_sq(last) <= REEVAL_DELTA_SQ {
                return None;
            }
        }
        self.last_eval = Some(keyboard);
        let angle = estimate_angle(keyboard, pad);
        debug!("hinge angle re-evaluated: {:.1} degrees", angle);
        Some(angle >= FOLD_THRESHOLD_DEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_angle_of_vector_with_itself_is_zero() {
        let a = Vector3::new(1.0, 2.0, -3.0);
        assert!(estimate_angle(a, a).abs() < 1e-6);
    }

    #[test]
    fn test_angle_is_symmetric() {
        let a = Vector3::new(1.0, 0.5, 0.25);
        let b = Vector3::new(-0.5, 2.0, 1.0);
        assert!((estimate_angle(a, b) - estimate_angle(b, a)).abs() < EPS);
    }

    #[test]
    fn test_known_angles() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        let neg_x = Vector3::new(-1.0, 0.0, 0.0);
        assert!((estimate_angle(x, y) - 90.0).abs() < 1e-6);
        assert!((estimate_angle(x, neg_x) - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_yields_zero_angle() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        assert_eq!(estimate_angle(a, Vector3::default()), 0.0);
        assert_eq!(estimate_angle(Vector3::default(), a), 0.0);
    }

    #[test]
    fn test_renormalized_magnitude_is_gravity() {
        let v = Vector3::new(3.0, 4.0, 12.0).renormalized();
        assert!((v.magnitude() - GRAVITY).abs() < EPS);
        assert_eq!(Vector3::default().renormalized(), Vector3::default());
    }

    #[test]
    fn test_sample_conversion_inverts_y_and_z() {
        let v = vector_from_sample(crate::protocol::AccelSample {
            x: 128,
            y: 128,
            z: -128,
        });
        assert!(v.x > 0.0);
        assert!(v.y < 0.0);
        assert!(v.z > 0.0);
        assert!((v.magnitude() - GRAVITY).abs() < EPS);
    }

    #[test]
    fn test_fold_tracker_first_sample_evaluates() {
        let mut tracker = FoldTracker::new();
        let up = Vector3::new(0.0, 0.0, GRAVITY);
        let down = Vector3::new(0.0, 0.0, -GRAVITY);
        assert_eq!(tracker.update(down, up), Some(true)); // 180 degrees
    }

    #[test]
    fn test_fold_tracker_noise_gate() {
        let mut tracker = FoldTracker::new();
        let up = Vector3::new(0.0, 0.0, GRAVITY);
        let kb = Vector3::new(0.0, 0.0, -GRAVITY);
        assert!(tracker.update(kb, up).is_some());

        // Sub-threshold wiggle: no re-evaluation
        let wiggle = Vector3::new(0.1, 0.0, -GRAVITY);
        assert!(kb.delta_sq(wiggle) <= REEVAL_DELTA_SQ + 1e-3);
        assert_eq!(tracker.update(Vector3::new(0.01, 0.0, -GRAVITY), up), None);

        // Large move: re-evaluated against the persistent baseline
        assert_eq!(tracker.update(up, up), Some(false));
    }

    #[test]
    fn test_fold_threshold_boundary() {
        let mut tracker = FoldTracker::new();
        let pad = Vector3::new(0.0, 0.0, GRAVITY);
        // 119 degrees from pad: not folded
        let rad = 119.0_f64.to_radians();
        let kb = Vector3::new(rad.sin() * GRAVITY, 0.0, rad.cos() * GRAVITY);
        assert_eq!(tracker.update(kb, pad), Some(false));

        // 121 degrees: folded
        let rad = 121.0_f64.to_radians();
        let kb = Vector3::new(rad.sin() * GRAVITY, 0.0, rad.cos() * GRAVITY);
        assert_eq!(tracker.update(kb, pad), Some(true));
    }
}
