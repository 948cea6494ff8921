// Stereo placement.

use std::f32::consts::PI;

/// Constant-power pan position, -1 (hard left) to +1 (hard right).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pan {
    left_gain: f32,
    right_gain: f32,
}

impl Pan {
    pub const CENTER: Pan = Pan {
        left_gain: std::f32::consts::FRAC_1_SQRT_2,
        right_gain: std::f32::consts::FRAC_1_SQRT_2,
    };
    pub const HARD_LEFT: Pan = Pan {
        left_gain: 1.0,
        right_gain: 0.0,
    };
    pub const HARD_RIGHT: Pan = Pan {
        left_gain: 0.0,
        right_gain: 1.0,
    };

    pub fn new(position: f32) -> Self {
        let angle = (position.clamp(-1.0, 1.0) + 1.0) * 0.25 * PI;
        Self {
            left_gain: angle.cos(),
            right_gain: angle.sin(),
        }
    }

    #[inline]
    pub fn gains(&self) -> (f32, f32) {
        (self.left_gain, self.right_gain)
    }
}

impl Default for Pan {
    fn default() -> Self {
        Self::CENTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_hard_panned() {
        let (l, r) = Pan::new(-1.0).gains();
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = Pan::new(1.0).gains();
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn center_is_constant_power() {
        let (l, r) = Pan::new(0.0).gains();
        assert!((l * l + r * r - 1.0).abs() < 1e-6);
        assert_eq!(Pan::default(), Pan::CENTER);
    }
}
