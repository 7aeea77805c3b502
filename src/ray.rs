use glam::Vec3;

use crate::Float;

/// A ray with a valid parameter interval `(near, far)`. The direction is
/// normalized by the constructors; kd-tree traversal tolerates unnormalized
/// directions but all shading code expects unit length.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub near: Float,
    pub far: Float,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Ray {
        Ray::with_near(origin, direction, 0.0)
    }

    pub fn with_near(origin: Vec3, direction: Vec3, near: Float) -> Ray {
        debug_assert!(near >= 0.0);
        Ray {
            origin,
            direction: direction.normalize(),
            near,
            far: Float::INFINITY,
        }
    }

    /// A ray spanning the segment from `origin` to `target`, with both ends
    /// pulled in by `near` to avoid re-hitting the endpoint surfaces.
    pub fn between(origin: Vec3, target: Vec3, near: Float) -> Ray {
        let distance = origin.distance(target);
        Ray {
            origin,
            direction: (target - origin) / distance,
            near,
            far: distance - near,
        }
    }

    pub fn at(&self, t: Float) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_normalized() {
        let r = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        assert!((r.direction.length() - 1.0).abs() < 1e-6);
        assert_eq!(r.at(2.0), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn between_spans_segment() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(5.0, 0.0, 0.0);
        let r = Ray::between(a, b, 0.1);
        assert_eq!(r.origin, a);
        assert_eq!(r.direction, Vec3::X);
        assert!((r.far - 3.9).abs() < 1e-6);
        assert!(r.near < r.far);
    }
}
