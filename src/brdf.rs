use glam::{Vec2, Vec3};

use crate::{
    color::Rgb,
    float::{INV_PI, PI},
    ltc,
    sampling::sample_hemisphere_cosine_directed,
    scattering::reflect,
    Float,
};

/// How a sampled direction was distributed. The path tracer uses this to
/// decide which pdf/cosine factors still need to be applied: a factor equal
/// to the sampling density cancels out and must be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingKind {
    Cosine,
    Brdf,
    Uniform,
}

/// Reflectance models. Modeled as a tagged variant rather than trait
/// objects so materials stay plain data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Brdf {
    Diffuse,
    Phong { exponent: Float },
    PhongEnergyConserving { exponent: Float },
    LtcBeckmann { roughness: Float },
}

impl Brdf {
    /// Outgoing radiance factor for light arriving from `vi` and leaving
    /// toward `vr`, both unit and pointing away from the surface.
    pub fn apply(&self, diffuse: Rgb, specular: Rgb, n: Vec3, vi: Vec3, vr: Vec3) -> Rgb {
        match *self {
            Brdf::Diffuse => diffuse * INV_PI,
            Brdf::Phong { exponent } => {
                let vs = reflect(vi, n);
                let c = vr.dot(vs).max(0.0).powf(exponent);
                diffuse * INV_PI + specular * c
            }
            Brdf::PhongEnergyConserving { exponent } => {
                let cos_in = vi.dot(n);
                let spec = if cos_in > 1e-4 {
                    let vs = reflect(vi, n);
                    let c = vr.dot(vs).max(0.0).powf(exponent) / cos_in;
                    let norm = (exponent + 2.0) / (2.0 * PI);
                    specular * (norm * c)
                } else {
                    Rgb::BLACK
                };
                diffuse * INV_PI + spec
            }
            Brdf::LtcBeckmann { roughness } => {
                let lobe = ltc::BECKMANN.eval(n, vi, vr, roughness);
                diffuse * INV_PI + specular * lobe
            }
        }
    }

    /// Draws an outgoing direction for a path continuing from a surface seen
    /// from `vr`. Returns the direction, the transfer coefficient already
    /// divided by the parts of the pdf that cancel, and the sampling kind.
    pub fn sample(
        &self,
        n: Vec3,
        vr: Vec3,
        _diffuse: Rgb,
        specular: Rgb,
        u: Vec2,
    ) -> (Vec3, Rgb, SamplingKind) {
        match *self {
            Brdf::Diffuse | Brdf::Phong { .. } | Brdf::PhongEnergyConserving { .. } => {
                let dir = sample_hemisphere_cosine_directed(u, n);
                (dir, Rgb::WHITE, SamplingKind::Cosine)
            }
            Brdf::LtcBeckmann { roughness } => {
                let dir = ltc::BECKMANN.sample(n, vr, roughness, u);
                let theta = vr.dot(n).clamp(-1.0, 1.0).acos();
                let amplitude = ltc::BECKMANN.amplitude(theta, roughness);
                (dir, specular * amplitude, SamplingKind::Brdf)
            }
        }
    }
}
