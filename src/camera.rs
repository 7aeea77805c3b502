use glam::{Vec2, Vec3};

use crate::{ray::Ray, sampling::sample_disc_concentric, Float};

/// Pinhole or thin-lens camera. The view plane sits one unit along the
/// forward axis and spans `xview` x `yview` world units; pixel coordinates
/// map linearly onto it, row zero at the top.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pos: Vec3,
    forward: Vec3,
    left: Vec3,
    up: Vec3,
    screen_corner: Vec3,
    screen_x: Vec3,
    screen_y: Vec3,
    focus: Float,
    lens_radius: Float,
}

impl Camera {
    pub fn new(
        pos: Vec3,
        look_at: Vec3,
        up_hint: Vec3,
        yview: Float,
        xview: Float,
        focus: Float,
        lens_radius: Float,
    ) -> Camera {
        let forward = (look_at - pos).normalize();
        let left = forward.cross(up_hint).normalize();
        let up = forward.cross(left).normalize();
        let screen_x = -xview * left;
        let screen_y = yview * up;
        let screen_corner = pos + forward - 0.5 * screen_y - 0.5 * screen_x;
        Camera {
            pos,
            forward,
            left,
            up,
            screen_corner,
            screen_x,
            screen_y,
            focus,
            lens_radius,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.pos
    }

    /// True for a pinhole camera; lens sampling is skipped entirely then.
    pub fn is_simple(&self) -> bool {
        self.lens_radius == 0.0
    }

    fn screen_point(&self, x: u32, y: u32, xres: u32, yres: u32, jitter: Vec2) -> Vec3 {
        let fx = (x as Float + jitter.x) / xres as Float;
        let fy = (y as Float + jitter.y) / yres as Float;
        self.screen_corner + fx * self.screen_x + fy * self.screen_y
    }

    /// Ray from the camera position through pixel `(x, y) + jitter`.
    pub fn primary_ray(&self, x: u32, y: u32, xres: u32, yres: u32, jitter: Vec2) -> Ray {
        let p = self.screen_point(x, y, xres, yres, jitter);
        Ray::new(self.pos, p - self.pos)
    }

    /// Primary ray through the center of subpixel `(sub_x, sub_y)` of an
    /// `grid x grid` multisampling pattern.
    pub fn subpixel_ray(
        &self,
        x: u32,
        y: u32,
        xres: u32,
        yres: u32,
        sub_x: u32,
        sub_y: u32,
        grid: u32,
    ) -> Ray {
        let jitter = Vec2::new(
            (sub_x as Float + 0.5) / grid as Float,
            (sub_y as Float + 0.5) / grid as Float,
        );
        self.primary_ray(x, y, xres, yres, jitter)
    }

    /// Thin-lens ray: the origin is jittered over the lens disc and the ray
    /// re-aimed so every lens sample converges on the focus plane.
    pub fn lens_ray(
        &self,
        x: u32,
        y: u32,
        xres: u32,
        yres: u32,
        pixel_jitter: Vec2,
        lens_jitter: Vec2,
    ) -> Ray {
        let primary = self.primary_ray(x, y, xres, yres, pixel_jitter);
        let along = primary.direction.dot(self.forward);
        let focus_point = self.pos + primary.direction * (self.focus / along);
        let d = sample_disc_concentric(lens_jitter) * self.lens_radius;
        let origin = self.pos + self.left * d.x + self.up * d.y;
        Ray::new(origin, focus_point - origin)
    }

    /// Inverse of `primary_ray`: which pixel does a world-space direction
    /// from the camera position land on? Returns None outside the frustum.
    pub fn project(&self, direction: Vec3, xres: u32, yres: u32) -> Option<(u32, u32)> {
        let along = direction.dot(self.forward);
        if along <= 1e-6 {
            return None;
        }
        let reach = direction / along;
        let offset = (self.pos + reach) - self.screen_corner;
        let a = offset.dot(self.screen_x) / self.screen_x.length_squared();
        let b = offset.dot(self.screen_y) / self.screen_y.length_squared();
        if !(0.0..1.0).contains(&a) || !(0.0..1.0).contains(&b) {
            return None;
        }
        Some(((a * xres as Float) as u32, (b * yres as Float) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        Camera::new(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            1.0,
            2.0,
            4.0,
            0.0,
        )
    }

    #[test]
    fn center_ray_points_forward() {
        let cam = test_camera();
        let r = cam.primary_ray(50, 25, 100, 50, Vec2::ZERO);
        assert_eq!(r.origin, Vec3::new(0.0, 0.0, 5.0));
        assert!(r.direction.distance(Vec3::NEG_Z) < 1e-5);
    }

    #[test]
    fn rays_are_unit_length() {
        let cam = test_camera();
        for (x, y) in [(0, 0), (99, 49), (13, 37)] {
            let r = cam.primary_ray(x, y, 100, 50, Vec2::new(0.5, 0.5));
            assert!((r.direction.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn project_inverts_primary_ray() {
        let cam = test_camera();
        for (x, y) in [(0, 0), (99, 49), (13, 37), (70, 12)] {
            let r = cam.primary_ray(x, y, 100, 50, Vec2::new(0.5, 0.5));
            let (px, py) = cam.project(r.direction, 100, 50).unwrap();
            assert_eq!((px, py), (x, y));
        }
        // Behind the camera projects nowhere.
        assert!(cam.project(Vec3::Z, 100, 50).is_none());
    }

    #[test]
    fn lens_rays_converge_on_focus_plane() {
        let cam = Camera::new(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            1.0,
            2.0,
            4.0,
            0.2,
        );
        assert!(!cam.is_simple());
        let jitter = Vec2::new(0.5, 0.5);
        let r1 = cam.lens_ray(20, 30, 100, 50, jitter, Vec2::new(0.1, 0.9));
        let r2 = cam.lens_ray(20, 30, 100, 50, jitter, Vec2::new(0.8, 0.2));
        // March both rays to the focus plane (z = 1 since focus = 4).
        let hit1 = r1.at((r1.origin.z - 1.0) / -r1.direction.z);
        let hit2 = r2.at((r2.origin.z - 1.0) / -r2.direction.z);
        assert!(hit1.distance(hit2) < 1e-4);
    }
}
