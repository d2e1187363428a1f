//! Easing curves for phase progress.

use serde::{Deserialize, Serialize};

/// Maps linear progress in `[0, 1]` onto an eased value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ease {
    /// Identity.
    Linear,
    /// Fast start, slow finish: `1 - (1 - t)³`.
    OutCubic,
    /// Slow start and finish.
    InOutCubic,
}

impl Ease {
    /// Apply the curve. Input outside `[0, 1]` is clamped.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Self::Linear => t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0_f64).mul_add(t, 2.0).powi(3) / 2.0)
                }
            }
        }
    }

    /// How many of `total` items are visible at progress `t`.
    ///
    /// Always `0` at `t = 0` and `total` at `t = 1`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn reveal(self, t: f64, total: usize) -> usize {
        let shown = (self.apply(t) * total as f64).floor() as usize;
        shown.min(total)
    }

    /// Eased progress as an `f32` opacity.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn opacity(self, t: f64) -> f32 {
        self.apply(t) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Ease; 3] = [Ease::Linear, Ease::OutCubic, Ease::InOutCubic];

    #[test]
    fn endpoints_are_stable() {
        for ease in ALL {
            assert!(ease.apply(0.0).abs() < f64::EPSILON);
            assert!((ease.apply(1.0) - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn monotonic_spot_check() {
        for ease in ALL {
            let a = ease.apply(0.25);
            let b = ease.apply(0.5);
            let c = ease.apply(0.75);
            assert!(a < b);
            assert!(b < c);
        }
    }

    #[test]
    fn out_cubic_front_loads() {
        assert!((Ease::OutCubic.apply(0.5) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn input_is_clamped() {
        for ease in ALL {
            assert!(ease.apply(-3.0).abs() < f64::EPSILON);
            assert!((ease.apply(7.0) - 1.0).abs() < f64::EPSILON);
            assert!(ease.apply(f64::NAN).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn reveal_counts_hit_both_ends() {
        assert_eq!(Ease::OutCubic.reveal(0.0, 37), 0);
        assert_eq!(Ease::OutCubic.reveal(1.0, 37), 37);
        assert_eq!(Ease::OutCubic.reveal(0.5, 40), 35);
        assert_eq!(Ease::Linear.reveal(0.5, 0), 0);
    }
}
