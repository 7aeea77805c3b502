use std::ops::{Add, Mul};

use crate::Float;

/// Result of a closest-hit query. `triangle` is an index into the scene's
/// triangle array; `None` means the ray escaped to the sky. The thin-glass
/// list is only populated by the collecting traversal variant and records
/// every transmissive triangle the ray crossed before the reported hit.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub triangle: Option<u32>,
    pub t: Float,
    /// Barycentric weight of the first vertex.
    pub a: Float,
    /// Barycentric weight of the second vertex; the third is `1 - a - b`.
    pub b: Float,
    pub thinglass: Vec<(u32, Float)>,
}

impl Intersection {
    pub fn miss() -> Intersection {
        Intersection {
            triangle: None,
            t: Float::INFINITY,
            a: 0.0,
            b: 0.0,
            thinglass: Vec::new(),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.triangle.is_some()
    }

    /// Barycentric interpolation of any per-vertex quantity.
    pub fn interpolate<T>(&self, va: T, vb: T, vc: T) -> T
    where
        T: Copy + Add<Output = T> + Mul<Float, Output = T>,
    {
        va * self.a + vb * self.b + vc * (1.0 - self.a - self.b)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;

    #[test]
    fn interpolate_weights_vertices() {
        let i = Intersection {
            triangle: Some(0),
            t: 1.0,
            a: 0.5,
            b: 0.25,
            thinglass: Vec::new(),
        };
        let v = i.interpolate(Vec3::X, Vec3::Y, Vec3::Z);
        assert!(v.distance(Vec3::new(0.5, 0.25, 0.25)) < 1e-6);
        let uv = i.interpolate(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::ZERO);
        assert!(uv.distance(Vec2::new(0.5, 0.25)) < 1e-6);
    }

    #[test]
    fn miss_is_not_a_hit() {
        assert!(!Intersection::miss().is_hit());
    }
}
