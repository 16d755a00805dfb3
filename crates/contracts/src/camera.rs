//! Pinhole camera parameters shared by every frame of one sensor.
//!
//! Intrinsic layout follows the usual convention:
//!
//! ```text
//! | fx  s  cx |
//! |  0 fy  cy |
//! |  0  0   1 |
//! ```

use nalgebra::{Matrix3, Matrix4};

/// Pose of a sensor relative to the designated identity sensor
pub type Extrinsic = Matrix4<f32>;

/// Number of lens distortion coefficients (k1, k2, p1, p2, k3)
pub const DISTORTION_COEFFS: usize = 5;

/// Intrinsic projection matrix plus distortion coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct CamParameters {
    pub intrinsic: Matrix3<f32>,
    pub distortion: [f32; DISTORTION_COEFFS],
}

impl Default for CamParameters {
    fn default() -> Self {
        Self {
            intrinsic: Matrix3::identity(),
            distortion: [1.0; DISTORTION_COEFFS],
        }
    }
}

impl CamParameters {
    pub fn new(intrinsic: Matrix3<f32>, distortion: [f32; DISTORTION_COEFFS]) -> Self {
        Self {
            intrinsic,
            distortion,
        }
    }

    /// Parameters with the given focal length and principal point, zero skew
    pub fn pinhole(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        #[rustfmt::skip]
        let intrinsic = Matrix3::new(
            fx,  0.0, cx,
            0.0, fy,  cy,
            0.0, 0.0, 1.0,
        );
        Self {
            intrinsic,
            ..Self::default()
        }
    }

    #[inline]
    pub fn fx(&self) -> f32 {
        self.intrinsic[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f32 {
        self.intrinsic[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f32 {
        self.intrinsic[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f32 {
        self.intrinsic[(1, 2)]
    }

    /// Copy with the top-left 2×3 block of the intrinsic scaled by `factor`.
    ///
    /// A factor of exactly 1.0 returns an unchanged copy.
    pub fn rescaled(&self, factor: f32) -> Self {
        let mut scaled = self.clone();
        if factor != 1.0 {
            for row in 0..2 {
                for col in 0..3 {
                    scaled.intrinsic[(row, col)] *= factor;
                }
            }
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity_with_unit_distortion() {
        let params = CamParameters::default();
        assert_eq!(params.intrinsic, Matrix3::identity());
        assert_eq!(params.distortion, [1.0; 5]);
    }

    #[test]
    fn test_rescale_touches_only_top_two_rows() {
        let params = CamParameters::pinhole(100.0, 120.0, 50.0, 40.0);
        let scaled = params.rescaled(0.5);
        assert_eq!(scaled.fx(), 50.0);
        assert_eq!(scaled.fy(), 60.0);
        assert_eq!(scaled.cx(), 25.0);
        assert_eq!(scaled.cy(), 20.0);
        assert_eq!(scaled.intrinsic[(2, 2)], 1.0);
        assert_eq!(params.rescaled(1.0), params);
    }
}
