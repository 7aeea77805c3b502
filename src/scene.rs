use glam::{Vec2, Vec3};

use crate::{
    color::Rgb,
    float::PI,
    intersection::Intersection,
    kdtree::KdTree,
    light::{Light, LightKind},
    material::Material,
    mesh::MeshData,
    ray::Ray,
    sampling::{orthonormal_basis, sample_disc_concentric},
    texture::Texture,
    triangle::Triangle,
    Float,
};

/// The scene owns all render data: triangles, materials, textures, lights
/// and the kd-tree over the triangles. Cross-references go through indices,
/// never pointers, so everything can be shared read-only across workers.
///
/// The triangle set is immutable after [`Scene::commit`].
#[derive(Debug)]
pub struct Scene {
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub lights: Vec<Light>,
    pub sky_color: Rgb,
    pub sky_texture: Option<u32>,
    /// Geometric tolerance used for shadow-ray offsets; derived from the
    /// scene extent at commit time.
    pub epsilon: Float,
    kdtree: KdTree,
    has_thinglass: bool,
}

impl Scene {
    pub fn new() -> Scene {
        Scene {
            triangles: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            lights: Vec::new(),
            sky_color: Rgb::BLACK,
            sky_texture: None,
            epsilon: 1e-5,
            kdtree: KdTree::build(&[]),
            has_thinglass: false,
        }
    }

    pub fn from_mesh(mesh: MeshData) -> Scene {
        let mut scene = Scene::new();
        scene.triangles = mesh.triangles;
        scene.materials = mesh.materials;
        scene.textures = mesh.textures;
        scene
    }

    /// Builds the kd-tree and freezes the triangle set.
    pub fn commit(&mut self) {
        self.kdtree = KdTree::build(&self.triangles);
        let diagonal = self.kdtree.bounds().diagonal();
        if diagonal.is_finite() {
            self.epsilon = (diagonal.length() * 1e-5).max(1e-5);
        }
        self.has_thinglass = self
            .triangles
            .iter()
            .any(|t| self.materials[t.material as usize].thinglass);
    }

    pub fn has_thinglass(&self) -> bool {
        self.has_thinglass
    }

    pub fn material_of(&self, triangle: u32) -> &Material {
        &self.materials[self.triangles[triangle as usize].material as usize]
    }

    pub fn is_thinglass(&self, triangle: u32) -> bool {
        self.material_of(triangle).thinglass
    }

    pub fn intersect(&self, ray: &Ray) -> Intersection {
        self.kdtree.find_closest(&self.triangles, ray)
    }

    pub fn intersect_excluding(&self, ray: &Ray, exclude: Option<u32>) -> Intersection {
        self.kdtree
            .find_closest_excluding(&self.triangles, ray, exclude)
    }

    pub fn intersect_excluding_with_thinglass(
        &self,
        ray: &Ray,
        exclude: Option<u32>,
    ) -> Intersection {
        let is_thin = |i: u32| self.is_thinglass(i);
        self.kdtree
            .find_closest_collecting_thinglass(&self.triangles, ray, exclude, &is_thin)
    }

    pub fn any_hit(&self, ray: &Ray) -> Option<u32> {
        self.kdtree.any_hit(&self.triangles, ray)
    }

    /// True when the segment between `a` and `b` is unobstructed. The
    /// endpoints are pulled in so the surfaces the segment connects do not
    /// occlude themselves.
    pub fn visibility(&self, a: Vec3, b: Vec3) -> bool {
        let distance = a.distance(b);
        let near = 2.0 * self.epsilon * distance;
        if distance <= 4.0 * near {
            return true;
        }
        let ray = Ray::between(a, b, near);
        self.any_hit(&ray).is_none()
    }

    /// Like [`Scene::visibility`], but thin-glass panes do not block; when
    /// the segment is clear the panes crossed are returned for filtering.
    pub fn visibility_with_thinglass(&self, a: Vec3, b: Vec3) -> Option<Vec<(u32, Float)>> {
        let distance = a.distance(b);
        let near = 2.0 * self.epsilon * distance;
        if distance <= 4.0 * near {
            return Some(Vec::new());
        }
        let ray = Ray::between(a, b, near);
        let isect = self.intersect_excluding_with_thinglass(&ray, None);
        if isect.is_hit() {
            None
        } else {
            Some(isect.thinglass)
        }
    }

    /// Radiance arriving from the sky along `direction` (a ray direction,
    /// pointing away from the viewer). Uses the environment map when one is
    /// configured, the flat sky color otherwise.
    pub fn sky_radiance(&self, direction: Vec3) -> Rgb {
        match self.sky_texture {
            Some(tex) => {
                let d = direction.normalize();
                let u = 0.5 + d.z.atan2(d.x) / (2.0 * PI);
                let v = d.y.clamp(-1.0, 1.0).acos() / PI;
                self.textures[tex as usize].sample_bilinear(Vec2::new(u, v))
            }
            None => self.sky_color,
        }
    }

    /// Uniformly picks one light; areal lights get their position jittered
    /// over the emitting disc using `areal_sample`.
    pub fn pick_light(&self, select: Float, areal_sample: Vec2) -> Option<Light> {
        if self.lights.is_empty() {
            return None;
        }
        let index = ((select * self.lights.len() as Float) as usize).min(self.lights.len() - 1);
        let mut light = self.lights[index];
        if light.kind == LightKind::Areal {
            let d = sample_disc_concentric(areal_sample) * light.size;
            let (t, b) = orthonormal_basis(light.normal);
            light.pos += t * d.x + b * d.y;
        }
        Some(light)
    }
}

impl Default for Scene {
    fn default() -> Scene {
        Scene::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(z: Float, material: u32) -> Triangle {
        Triangle {
            positions: [
                Vec3::new(-10.0, -10.0, z),
                Vec3::new(10.0, -10.0, z),
                Vec3::new(0.0, 10.0, z),
            ],
            normals: [Vec3::Z; 3],
            tangents: [Vec3::X; 3],
            uvs: [Vec2::ZERO; 3],
            material,
        }
    }

    #[test]
    fn empty_scene_returns_sky() {
        let mut scene = Scene::new();
        scene.sky_color = Rgb::new(0.2, 0.4, 0.8);
        scene.commit();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(!scene.intersect(&ray).is_hit());
        assert_eq!(scene.sky_radiance(ray.direction), Rgb::new(0.2, 0.4, 0.8));
    }

    #[test]
    fn visibility_blocked_by_wall() {
        let mut scene = Scene::new();
        scene.materials.push(Material::default());
        scene.triangles.push(wall(1.0, 0));
        scene.commit();
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 0.0, 2.0);
        assert!(!scene.visibility(a, b));
        // A segment that stops short of the wall is clear.
        assert!(scene.visibility(a, Vec3::new(0.0, 0.0, 0.5)));
    }

    #[test]
    fn thinglass_does_not_block_but_is_reported() {
        let mut scene = Scene::new();
        scene.materials.push(Material::default());
        let mut glass = Material::default();
        glass.thinglass = true;
        glass.diffuse = Rgb::new(1.0, 0.0, 0.0);
        scene.materials.push(glass);
        scene.triangles.push(wall(1.0, 1));
        scene.commit();
        assert!(scene.has_thinglass());
        let crossed = scene
            .visibility_with_thinglass(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0))
            .expect("pane should not block");
        assert_eq!(crossed.len(), 1);
        assert_eq!(crossed[0].0, 0);
    }

    #[test]
    fn pick_light_jitters_areal_position_on_disc() {
        let mut scene = Scene::new();
        scene.lights.push(Light {
            kind: LightKind::Areal,
            pos: Vec3::new(0.0, 5.0, 0.0),
            normal: Vec3::new(0.0, -1.0, 0.0),
            size: 2.0,
            color: Rgb::WHITE,
            intensity: 1.0,
        });
        scene.commit();
        let l = scene.pick_light(0.5, Vec2::new(0.9, 0.2)).unwrap();
        let offset = l.pos - Vec3::new(0.0, 5.0, 0.0);
        assert!(offset.length() <= 2.0 + 1e-4);
        // Jitter stays in the disc plane.
        assert!(offset.dot(Vec3::new(0.0, -1.0, 0.0)).abs() < 1e-4);
    }
}
