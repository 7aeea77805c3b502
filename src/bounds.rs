use glam::Vec3;

use crate::{ray::Ray, Float};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds3f {
    /// An empty box: unioning anything into it yields that thing's bounds.
    pub const EMPTY: Bounds3f = Bounds3f {
        min: Vec3::splat(Float::INFINITY),
        max: Vec3::splat(Float::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Bounds3f {
        Bounds3f { min, max }
    }

    pub fn from_points(points: &[Vec3]) -> Bounds3f {
        points
            .iter()
            .fold(Bounds3f::EMPTY, |b, &p| b.union_point(p))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn union(&self, other: &Bounds3f) -> Bounds3f {
        Bounds3f {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn union_point(&self, p: Vec3) -> Bounds3f {
        Bounds3f {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn centroid(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Index of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.diagonal();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Slab test. Returns the parametric interval where the ray overlaps the
    /// box, clipped against the initial `(t0, t1)` window, or None when the
    /// ray misses. `f32::min`/`max` make zero direction components safe.
    pub fn intersect_interval(
        &self,
        ray: &Ray,
        mut t0: Float,
        mut t1: Float,
    ) -> Option<(Float, Float)> {
        for axis in 0..3 {
            let inv = 1.0 / ray.direction[axis];
            let mut t_near = (self.min[axis] - ray.origin[axis]) * inv;
            let mut t_far = (self.max[axis] - ray.origin[axis]) * inv;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t0 = t0.max(t_near);
            t1 = t1.min(t_far);
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}
