use glam::{Mat3, Vec2, Vec3};
use once_cell::sync::Lazy;

use crate::{
    float::PI,
    sampling::{orthonormal_basis, sample_hemisphere_cosine},
    Float,
};

/// Number of table cells per axis; the grid stores `STEPS + 1` rows and
/// columns so bilinear interpolation never reads past the edge.
const STEPS: usize = 8;

/// Shared Beckmann fit, built once on first use.
pub static BECKMANN: Lazy<LtcTable> = Lazy::new(LtcTable::beckmann);

/// Linearly Transformed Cosines table: for each (view angle, roughness) cell
/// a 3x3 matrix warping a cosine lobe into the BRDF lobe, plus a scalar
/// amplitude. Lookups interpolate bilinearly; the roughness axis is indexed
/// by sqrt(alpha) to give more resolution to glossy materials.
pub struct LtcTable {
    matrices: Vec<Mat3>,
    amplitudes: Vec<Float>,
}

impl LtcTable {
    fn beckmann() -> LtcTable {
        let mut matrices = Vec::with_capacity((STEPS + 1) * (STEPS + 1));
        let mut amplitudes = Vec::with_capacity((STEPS + 1) * (STEPS + 1));
        for ti in 0..=STEPS {
            let theta = (ti as Float / STEPS as Float) * (0.5 * PI);
            for ai in 0..=STEPS {
                let a = ai as Float / STEPS as Float;
                let alpha = a * a;
                let (m, amp) = Self::fit(theta, alpha);
                matrices.push(m);
                amplitudes.push(amp);
            }
        }
        LtcTable {
            matrices,
            amplitudes,
        }
    }

    /// Parametric fit of the Beckmann lobe: scale the cosine distribution by
    /// the roughness and tilt it toward the mirror direction of the view.
    /// Local frame convention: +Z is the normal, the view lies in the X-Z
    /// plane on the +X side.
    fn fit(theta: Float, alpha: Float) -> (Mat3, Float) {
        let spread = alpha.max(1e-3);
        let m = Mat3::from_rotation_y(-theta) * Mat3::from_diagonal(Vec3::new(spread, spread, 1.0));
        let amplitude = 1.0 / (1.0 + alpha * theta);
        (m, amplitude)
    }

    fn cell(&self, ti: usize, ai: usize) -> (Mat3, Float) {
        let index = ti * (STEPS + 1) + ai;
        (self.matrices[index], self.amplitudes[index])
    }

    /// Bilinearly interpolated matrix and amplitude for a view angle
    /// `theta` (radians from the normal) and roughness `alpha` in [0, 1].
    pub fn fetch(&self, theta: Float, alpha: Float) -> (Mat3, Float) {
        let t = (theta / (0.5 * PI)).clamp(0.0, 0.999);
        let a = alpha.max(0.0).sqrt().min(0.999);
        let tf = t * STEPS as Float;
        let af = a * STEPS as Float;
        let t1 = tf.floor() as usize;
        let a1 = af.floor() as usize;
        let dt = tf - t1 as Float;
        let da = af - a1 as Float;

        let (m11, amp11) = self.cell(t1, a1);
        let (m12, amp12) = self.cell(t1, a1 + 1);
        let (m21, amp21) = self.cell(t1 + 1, a1);
        let (m22, amp22) = self.cell(t1 + 1, a1 + 1);

        let m = m11 * ((1.0 - dt) * (1.0 - da))
            + m12 * ((1.0 - dt) * da)
            + m21 * (dt * (1.0 - da))
            + m22 * (dt * da);
        let amp = amp11 * (1.0 - dt) * (1.0 - da)
            + amp12 * (1.0 - dt) * da
            + amp21 * dt * (1.0 - da)
            + amp22 * dt * da;
        (m, amp)
    }

    /// Interpolated amplitude only.
    pub fn amplitude(&self, theta: Float, alpha: Float) -> Float {
        self.fetch(theta, alpha).1
    }

    /// Draws an outgoing direction: a cosine-hemisphere vector warped by the
    /// table matrix, re-expressed in the world tangent frame around
    /// `(n, view)`. Returns a unit vector.
    pub fn sample(&self, n: Vec3, view: Vec3, alpha: Float, u: Vec2) -> Vec3 {
        let frame = Self::frame(n, view);
        let theta = view.dot(n).clamp(-1.0, 1.0).acos();
        let (m, _) = self.fetch(theta, alpha);
        let warped = m * sample_hemisphere_cosine(u);
        (frame * warped).normalize()
    }

    /// Evaluates the warped cosine density toward `dir`, including the table
    /// amplitude and the change-of-variables Jacobian. Non-finite results
    /// (possible at degenerate configurations) collapse to zero.
    pub fn eval(&self, n: Vec3, axis_dir: Vec3, dir: Vec3, alpha: Float) -> Float {
        let frame = Self::frame(n, axis_dir);
        let local = frame.transpose() * dir;
        let theta = axis_dir.dot(n).clamp(-1.0, 1.0).acos();
        let (m, amplitude) = self.fetch(theta, alpha);
        let p = (m.inverse() * local).normalize();
        let warped_len = (m * p).length();
        let jacobian = m.determinant() / (warped_len * warped_len * warped_len);
        let d = p.z.max(0.0) / PI;
        let value = amplitude * d / jacobian;
        if value.is_finite() {
            value.max(0.0)
        } else {
            0.0
        }
    }

    /// Orthonormal frame with `n` as +Z and `axis_dir` cast into the X-Z
    /// plane on the +X side. Falls back to an arbitrary tangent frame when
    /// `axis_dir` is parallel to the normal.
    fn frame(n: Vec3, axis_dir: Vec3) -> Mat3 {
        let t = n.cross(axis_dir);
        if t.length_squared() < 1e-8 {
            let (x, y) = orthonormal_basis(n);
            return Mat3::from_cols(x, y, n);
        }
        let y = t.normalize();
        let x = y.cross(n);
        Mat3::from_cols(x, y, n)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn fetch_interpolates_within_range() {
        let (m, amp) = BECKMANN.fetch(0.3, 0.5);
        assert!(m.determinant() > 0.0);
        assert!(amp > 0.0 && amp <= 1.0);
        // Extremes stay in range instead of indexing past the table.
        BECKMANN.fetch(10.0, 5.0);
        BECKMANN.fetch(-1.0, -1.0);
    }

    #[test]
    fn samples_are_unit_vectors() {
        let mut rng = SmallRng::seed_from_u64(5);
        let n = Vec3::Z;
        let view = Vec3::new(0.4, 0.0, 0.9).normalize();
        for _ in 0..500 {
            let d = BECKMANN.sample(n, view, 0.3, Vec2::new(rng.gen(), rng.gen()));
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn eval_is_nonnegative_and_finite() {
        let mut rng = SmallRng::seed_from_u64(6);
        let n = Vec3::Z;
        for _ in 0..500 {
            let dir = crate::sampling::sample_sphere_uniform(Vec2::new(rng.gen(), rng.gen()));
            let axis = crate::sampling::sample_sphere_uniform(Vec2::new(rng.gen(), rng.gen()));
            let v = BECKMANN.eval(n, axis, dir, rng.gen());
            assert!(v.is_finite());
            assert!(v >= 0.0);
        }
    }
}
