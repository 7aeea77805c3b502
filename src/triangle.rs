use glam::{Vec2, Vec3};

use crate::{bounds::Bounds3f, ray::Ray, Float};

/// Determinants smaller than this are treated as a parallel ray.
const DET_EPSILON: Float = 1e-8;
/// Barycentric coordinates may exceed [0, 1] by this much before a hit is
/// rejected; keeps shared edges watertight.
const BARY_EPSILON: Float = 1e-6;

/// A triangle with per-vertex shading attributes. Triangles reference their
/// material by index into the owning scene's material array.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub positions: [Vec3; 3],
    pub normals: [Vec3; 3],
    pub tangents: [Vec3; 3],
    pub uvs: [Vec2; 3],
    pub material: u32,
}

impl Triangle {
    /// Unit geometric normal derived from the winding order.
    pub fn face_normal(&self) -> Vec3 {
        let e1 = self.positions[1] - self.positions[0];
        let e2 = self.positions[2] - self.positions[0];
        e1.cross(e2).normalize()
    }

    pub fn area(&self) -> Float {
        let e1 = self.positions[1] - self.positions[0];
        let e2 = self.positions[2] - self.positions[0];
        0.5 * e1.cross(e2).length()
    }

    pub fn bounds(&self) -> Bounds3f {
        Bounds3f::from_points(&self.positions)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.positions[0] + self.positions[1] + self.positions[2]) / 3.0
    }

    /// Möller-Trumbore intersection. Returns `(t, a, b)` where `a` and `b`
    /// are the barycentric weights of the first and second vertex, so any
    /// per-vertex quantity interpolates as `a*A + b*B + (1-a-b)*C`.
    /// NaN never escapes: degenerate configurations report a miss.
    pub fn intersect(&self, ray: &Ray) -> Option<(Float, Float, Float)> {
        let e1 = self.positions[1] - self.positions[0];
        let e2 = self.positions[2] - self.positions[0];
        let pvec = ray.direction.cross(e2);
        let det = e1.dot(pvec);
        if det.abs() < DET_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = ray.origin - self.positions[0];
        let u = tvec.dot(pvec) * inv_det;
        if u < -BARY_EPSILON || u > 1.0 + BARY_EPSILON {
            return None;
        }
        let qvec = tvec.cross(e1);
        let v = ray.direction.dot(qvec) * inv_det;
        if v < -BARY_EPSILON || u + v > 1.0 + BARY_EPSILON {
            return None;
        }
        let t = e2.dot(qvec) * inv_det;
        if !t.is_finite() || t < ray.near || t > ray.far {
            return None;
        }
        Some((t, 1.0 - u - v, u))
    }
}
