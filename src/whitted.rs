use glam::Vec2;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    camera::Camera,
    color::Rgb,
    lru::LruBuffer,
    ray::Ray,
    scattering::reflect,
    scene::Scene,
    tracer::{PixelRenderResult, TracerI},
    Float,
};

/// Occluders remembered per light; found shadows tend to repeat across
/// neighbouring pixels.
const SHADOW_CACHE_SIZE: usize = 5;
/// Reach of reflection rays.
const REFLECTION_RANGE: Float = 1000.0;

/// Recursive direct-lighting tracer with perfect reflections. Materials
/// with an exponent below one act as partial mirrors: their local shading
/// is blended with a recursively traced reflection.
pub struct WhittedTracer<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
    xres: u32,
    yres: u32,
    multisample: u32,
    recursion_level: u32,
    bumpmap_scale: Float,
    shadow_cache: Vec<LruBuffer<u32>>,
    rng: SmallRng,
}

impl<'a> WhittedTracer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scene: &'a Scene,
        camera: &'a Camera,
        xres: u32,
        yres: u32,
        multisample: u32,
        recursion_level: u32,
        bumpmap_scale: Float,
        seed: u64,
    ) -> WhittedTracer<'a> {
        WhittedTracer {
            scene,
            camera,
            xres,
            yres,
            multisample,
            recursion_level,
            bumpmap_scale,
            shadow_cache: vec![LruBuffer::new(SHADOW_CACHE_SIZE); scene.lights.len()],
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn trace_ray(&mut self, ray: &Ray, depth: u32, raycount: &mut u64, debug: bool) -> Rgb {
        *raycount += 1;
        let isect = self.scene.intersect(ray);
        let Some(tri_index) = isect.triangle else {
            return self.scene.sky_radiance(ray.direction);
        };

        let triangle = &self.scene.triangles[tri_index as usize];
        let mat = &self.scene.materials[triangle.material as usize];
        let mut total = Rgb::BLACK;

        let ipos = ray.at(isect.t);
        let mut normal =
            isect.interpolate(triangle.normals[0], triangle.normals[1], triangle.normals[2]);
        if normal.is_nan() || normal.length_squared() <= 0.0 {
            // Broken vertex normals; contribute nothing rather than NaN.
            return Rgb::BLACK;
        }
        normal = normal.normalize();
        let view = -ray.direction;

        let tex_uv = if mat.has_any_texture() {
            isect.interpolate(triangle.uvs[0], triangle.uvs[1], triangle.uvs[2])
        } else {
            Vec2::ZERO
        };
        let textures = &self.scene.textures;
        let diffuse = mat
            .diffuse_texture
            .map(|t| textures[t as usize].sample_bilinear(tex_uv))
            .unwrap_or(mat.diffuse);
        let specular = mat
            .specular_texture
            .map(|t| textures[t as usize].sample_bilinear(tex_uv))
            .unwrap_or(mat.specular);
        let ambient = mat
            .ambient_texture
            .map(|t| textures[t as usize].sample_bilinear(tex_uv))
            .unwrap_or(mat.ambient);

        if let Some(bump) = mat.bump_texture {
            let bump_tex = &textures[bump as usize];
            let right = bump_tex.slope_right(tex_uv);
            let bottom = bump_tex.slope_bottom(tex_uv);
            let tangent = isect.interpolate(
                triangle.tangents[0],
                triangle.tangents[1],
                triangle.tangents[2],
            );
            if tangent.length_squared() > 1e-3 {
                let bitangent = normal.cross(tangent.normalize()).normalize();
                let perturbed =
                    normal + (tangent.normalize() * right + bitangent * bottom) * self.bumpmap_scale;
                if perturbed.length_squared() > 0.0 && !perturbed.is_nan() {
                    normal = perturbed.normalize();
                }
            }
        }

        if debug {
            eprintln!("hit {} at t={} diffuse={:?}", mat.name, isect.t, diffuse);
        }

        for light_index in 0..self.scene.lights.len() {
            let light = self.scene.lights[light_index];
            let to_light = (light.pos - ipos).normalize();
            let distance = ipos.distance(light.pos);

            let mut shadow_triangle: Option<u32> = None;
            if depth > 0 {
                let shadow_ray = Ray::between(ipos, light.pos, self.scene.epsilon * 2.0 * distance);
                // Cached occluders first; a hit skips the kd-tree entirely.
                let mut widened = shadow_ray;
                widened.near = (widened.near - self.scene.epsilon).max(0.0);
                widened.far += self.scene.epsilon;
                for &cached in &self.shadow_cache[light_index] {
                    *raycount += 1;
                    if self.scene.triangles[cached as usize]
                        .intersect(&widened)
                        .is_some()
                    {
                        shadow_triangle = Some(cached);
                        break;
                    }
                }
                if shadow_triangle.is_none() {
                    *raycount += 1;
                    shadow_triangle = self.scene.any_hit(&shadow_ray);
                }
            }

            match shadow_triangle {
                Some(occluder) => {
                    if debug {
                        eprintln!("light {} shadowed by triangle {}", light_index, occluder);
                    }
                    self.shadow_cache[light_index].note_use(occluder);
                }
                None => {
                    let d = distance * distance;
                    let falloff = 1.0 / (3.0 + d) / 4.85;
                    let intensity = light.intensity * falloff;

                    let kd = normal.dot(to_light).max(0.0);
                    total += light.color * diffuse * (intensity * kd);

                    if mat.exponent > 1.0 {
                        let r = reflect(to_light, normal);
                        let ks = r.dot(view).max(0.0).powf(mat.exponent);
                        total += light.color * specular * (intensity * ks);
                    }
                }
            }
        }

        // With no lights at all, show plain albedo so geometry stays visible.
        if self.scene.lights.is_empty() {
            total += diffuse;
        }

        total += ambient * 0.1;

        if depth >= 2 && mat.exponent < 1.0 {
            let refl = reflect(view, normal);
            let mut refl_ray = Ray::with_near(ipos, refl, 0.01);
            refl_ray.far = REFLECTION_RANGE;
            let reflection = self.trace_ray(&refl_ray, depth - 1, raycount, debug);
            total = reflection * mat.exponent + total * (1.0 - mat.exponent);
        }

        total
    }
}

impl TracerI for WhittedTracer<'_> {
    fn render_pixel(
        &mut self,
        x: u32,
        y: u32,
        raycount: &mut u64,
        debug: bool,
    ) -> PixelRenderResult {
        let m = self.multisample;
        let mut total = Rgb::BLACK;
        for sub_y in 0..m {
            for sub_x in 0..m {
                // Serpentine subpixel order keeps successive rays coherent.
                let sx = if sub_y % 2 == 0 { m - sub_x - 1 } else { sub_x };
                let ray = if self.camera.is_simple() {
                    self.camera
                        .subpixel_ray(x, y, self.xres, self.yres, sx, sub_y, m)
                } else {
                    let pixel_jitter = Vec2::new(self.rng.gen(), self.rng.gen());
                    let lens_jitter = Vec2::new(self.rng.gen(), self.rng.gen());
                    self.camera
                        .lens_ray(x, y, self.xres, self.yres, pixel_jitter, lens_jitter)
                };
                total += self.trace_ray(&ray, self.recursion_level, raycount, debug);
            }
        }
        PixelRenderResult {
            main: total * (1.0 / (m * m) as Float),
            splats: Vec::new(),
        }
    }
}
