use glam::{Quat, Vec3};

use crate::Float;

/// Mirror reflection of a direction pointing away from the surface.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    2.0 * v.dot(n) * n - v
}

/// Dielectric Fresnel reflectance for an interface with relative index
/// `ior`. `i` points away from the surface. Returns 1 on total internal
/// reflection; the result is always in [0, 1].
pub fn fresnel_dielectric(i: Vec3, n: Vec3, ior: Float) -> Float {
    let mut cosi = i.dot(n);
    let (mut etai, mut etat) = (1.0, ior);
    if cosi > 0.0 {
        std::mem::swap(&mut etai, &mut etat);
    }
    // Snell's law.
    let sint = etai / etat * (1.0 - cosi * cosi).max(0.0).sqrt();
    if sint >= 1.0 {
        // Total internal reflection.
        1.0
    } else {
        let cost = (1.0 - sint * sint).max(0.0).sqrt();
        cosi = cosi.abs();
        let rs = ((etat * cosi) - (etai * cost)) / ((etat * cosi) + (etai * cost));
        let rp = ((etai * cosi) - (etat * cost)) / ((etai * cosi) + (etat * cost));
        (rs * rs + rp * rp) / 2.0
    }
}

/// Refracts `incoming` (pointing away from the surface) through a surface
/// with normal `n` and relative index `ior`. Returns a NaN vector on total
/// internal reflection; callers reclassify the bounce as a reflection.
pub fn refract(incoming: Vec3, n: Vec3, ior: Float) -> Vec3 {
    if incoming.dot(n) > 0.999 {
        return -incoming;
    }
    let tangent = n.cross(incoming).normalize();
    let cos_eta1 = incoming.dot(n);
    let sin_eta1 = (1.0 - cos_eta1 * cos_eta1).sqrt();
    let sin_eta2 = sin_eta1 * ior;
    if sin_eta2 >= 1.0 {
        return Vec3::NAN;
    }
    let eta2 = sin_eta2.asin();
    Quat::from_axis_angle(tangent, eta2) * -n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresnel_is_bounded_and_symmetric() {
        let n = Vec3::Z;
        for deg in 1..90 {
            let a = (deg as Float).to_radians();
            let i = Vec3::new(a.sin(), 0.0, a.cos());
            let f = fresnel_dielectric(i, n, 1.5);
            assert!((0.0..=1.0).contains(&f));
            // Entering from the other side of the interface.
            let f_rev = fresnel_dielectric(-i, n, 1.5);
            assert!((0.0..=1.0).contains(&f_rev));
        }
    }

    #[test]
    fn fresnel_is_reciprocal_across_the_interface() {
        let n = Vec3::Z;
        for deg in 1..40 {
            let theta_i = (deg as Float).to_radians();
            let theta_t = (theta_i.sin() / 1.5).asin();
            // Entering the denser medium at theta_i...
            let enter = fresnel_dielectric(
                Vec3::new(theta_i.sin(), 0.0, theta_i.cos()),
                n,
                1.0 / 1.5,
            );
            // ...matches leaving it at the refracted angle.
            let exit = fresnel_dielectric(
                Vec3::new(theta_t.sin(), 0.0, theta_t.cos()),
                n,
                1.5,
            );
            assert!((enter - exit).abs() < 1e-4, "{} vs {}", enter, exit);
        }
    }

    #[test]
    fn fresnel_reports_total_internal_reflection() {
        // Leaving glass at a grazing angle.
        let n = Vec3::Z;
        let a: Float = 80.0_f32.to_radians();
        let i = Vec3::new(a.sin(), 0.0, -a.cos());
        assert_eq!(fresnel_dielectric(i, n, 1.0 / 1.5), 1.0);
    }

    #[test]
    fn refract_straight_through_at_unit_ior() {
        let n = Vec3::Z;
        let a: Float = 30.0_f32.to_radians();
        // Incoming direction pointing away from the surface.
        let vr = Vec3::new(a.sin(), 0.0, a.cos());
        let d = refract(vr, n, 1.0);
        // With matched indices the transmitted ray continues the incident one.
        assert!(d.dot(-vr) > 1.0 - 1e-4);
    }

    #[test]
    fn refract_through_slab_exits_parallel() {
        let n = Vec3::Z;
        let a: Float = 40.0_f32.to_radians();
        let vr = Vec3::new(a.sin(), 0.0, a.cos());
        let ior = 1.5;
        // Enter the slab, then leave through the parallel back face. At the
        // exit the shading normal is flipped to face the arriving ray.
        let inside = refract(vr, n, 1.0 / ior);
        assert!(!inside.x.is_nan());
        let out = refract(-inside, n, ior);
        assert!(!out.x.is_nan());
        assert!(out.dot(-vr) > 1.0 - 1e-4);
    }

    #[test]
    fn refract_signals_tir_with_nan() {
        let n = Vec3::Z;
        let a: Float = 80.0_f32.to_radians();
        let vr = Vec3::new(a.sin(), 0.0, a.cos());
        let d = refract(vr, n, 1.5);
        assert!(d.x.is_nan());
    }

    #[test]
    fn reflect_mirrors_about_normal() {
        let v = Vec3::new(1.0, 0.0, 1.0).normalize();
        let r = reflect(v, Vec3::Z);
        assert!(r.distance(Vec3::new(-1.0, 0.0, 1.0).normalize()) < 1e-6);
    }
}
