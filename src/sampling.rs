use glam::{Vec2, Vec3};

use crate::{
    float::{ONE_MINUS_EPSILON, PI},
    Float,
};

/// Maps a uniform [0,1)^2 sample onto the unit disc with low distortion.
pub fn sample_disc_concentric(u: Vec2) -> Vec2 {
    let offset = 2.0 * u - Vec2::ONE;
    if offset == Vec2::ZERO {
        return Vec2::ZERO;
    }
    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, (PI / 4.0) * (offset.y / offset.x))
    } else {
        (offset.y, (PI / 2.0) - (PI / 4.0) * (offset.x / offset.y))
    };
    r * Vec2::new(theta.cos(), theta.sin())
}

/// Cosine-weighted hemisphere sample around +Z.
pub fn sample_hemisphere_cosine(u: Vec2) -> Vec3 {
    let d = sample_disc_concentric(u);
    let z = (1.0 - d.x * d.x - d.y * d.y).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

/// Cosine-weighted hemisphere sample around an arbitrary unit direction.
pub fn sample_hemisphere_cosine_directed(u: Vec2, n: Vec3) -> Vec3 {
    let local = sample_hemisphere_cosine(u);
    let (t, b) = orthonormal_basis(n);
    (local.x * t + local.y * b + local.z * n).normalize()
}

/// Uniform sample on the unit sphere.
pub fn sample_sphere_uniform(u: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Builds a right-handed tangent frame around a unit normal.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let helper = if n.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
    let t = n.cross(helper).normalize();
    let b = n.cross(t);
    (t, b)
}

/// Takes a probabilistic decision with probability `p` using `u`, then
/// rescales `u` back onto [0, 1) so the same sample can drive the next
/// decision without paying for another draw.
pub fn decide_and_rescale(u: &mut Float, p: Float) -> bool {
    if p <= 0.0 {
        return false;
    }
    if p >= 1.0 {
        return true;
    }
    if *u < p {
        *u = (*u / p).min(ONE_MINUS_EPSILON);
        true
    } else {
        *u = ((*u - p) / (1.0 - p)).min(ONE_MINUS_EPSILON);
        false
    }
}
