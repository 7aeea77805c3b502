use glam::Vec3;

use crate::{color::Rgb, Float};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    /// Disc of radius `size` facing along `normal`.
    Areal,
    /// Uniform sphere of radius `size` around the position.
    FullSphere,
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub kind: LightKind,
    pub pos: Vec3,
    /// Emission axis; meaningful for areal lights and used as the default
    /// outgoing hemisphere for light subpaths.
    pub normal: Vec3,
    pub size: Float,
    pub color: Rgb,
    pub intensity: Float,
}

impl Light {
    /// Emission weight toward `outgoing`: areal discs emit cosine-weighted
    /// from their front side only, the other kinds are isotropic.
    pub fn directional_factor(&self, outgoing: Vec3) -> Float {
        match self.kind {
            LightKind::Point | LightKind::FullSphere => 1.0,
            LightKind::Areal => self.normal.dot(outgoing).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn areal_factor_clamps_backside() {
        let l = Light {
            kind: LightKind::Areal,
            pos: Vec3::ZERO,
            normal: Vec3::Z,
            size: 1.0,
            color: Rgb::WHITE,
            intensity: 1.0,
        };
        assert_eq!(l.directional_factor(Vec3::Z), 1.0);
        assert_eq!(l.directional_factor(-Vec3::Z), 0.0);
        let diag = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert!((l.directional_factor(diag) - diag.z).abs() < 1e-6);
    }

    #[test]
    fn point_and_sphere_are_isotropic() {
        for kind in [LightKind::Point, LightKind::FullSphere] {
            let l = Light {
                kind,
                pos: Vec3::ZERO,
                normal: Vec3::Z,
                size: 0.5,
                color: Rgb::WHITE,
                intensity: 2.0,
            };
            assert_eq!(l.directional_factor(-Vec3::Z), 1.0);
        }
    }
}
