use glam::{Vec2, Vec3};

use crate::{
    brdf::SamplingKind,
    camera::Camera,
    color::Rgb,
    film::Splat,
    float::PI,
    light::LightKind,
    ray::Ray,
    sampler::{Sampler, SamplerI},
    sampling::{decide_and_rescale, sample_hemisphere_cosine_directed, sample_sphere_uniform},
    scattering::{fresnel_dielectric, reflect, refract},
    scene::Scene,
    tracer::{PixelRenderResult, TracerI},
    Float,
};

/// Absolute cap on path length, regardless of depth or roulette settings.
const MAX_PATH_LENGTH: u32 = 20;
/// Light-subpath deposits with a geometry term below this are discarded.
const MIN_SPLAT_G: Float = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointKind {
    /// Bounced off the surface via a BRDF sample.
    Scattered,
    /// Fresnel mirror bounce.
    Reflected,
    /// Refracted into a translucent medium.
    Entered,
    /// Refracted back out of a translucent medium.
    Left,
}

/// One vertex of a camera or light subpath.
struct PathPoint {
    pos: Vec3,
    /// Geometric normal, flipped to face the incoming ray.
    face_n: Vec3,
    /// Shading normal after bump perturbation.
    light_n: Vec3,
    /// Unit direction back toward the previous vertex.
    vr: Vec3,
    kind: PointKind,
    /// The surface was hit from its back side.
    backside: bool,
    /// The ray escaped to the sky; only `vr` and `thinglass` are valid.
    infinity: bool,
    material: u32,
    diffuse: Rgb,
    specular: Rgb,
    /// BRDF/pdf/cosine factors for the continuation leaving this vertex.
    transfer: Rgb,
    russian_coefficient: Float,
    /// Radiance arriving here from the light; light subpaths only.
    light_from_source: Rgb,
    thinglass: Vec<(u32, Float)>,
}

impl PathPoint {
    fn sky(vr: Vec3, thinglass: Vec<(u32, Float)>) -> PathPoint {
        PathPoint {
            pos: Vec3::ZERO,
            face_n: Vec3::Z,
            light_n: Vec3::Z,
            vr,
            kind: PointKind::Scattered,
            backside: false,
            infinity: true,
            material: 0,
            diffuse: Rgb::BLACK,
            specular: Rgb::BLACK,
            transfer: Rgb::WHITE,
            russian_coefficient: 1.0,
            light_from_source: Rgb::BLACK,
            thinglass,
        }
    }
}

/// Monte-Carlo integrator building two subpaths per camera sample: a
/// forward path from the camera and a short subpath from a randomly chosen
/// light. Besides shading the forward path (direct lighting plus
/// connections to the light subpath), every scattered light-subpath vertex
/// visible from the camera deposits radiance at its projected pixel.
pub struct PathTracer<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
    xres: u32,
    yres: u32,
    multisample: u32,
    depth: u32,
    clamp: Float,
    russian: Float,
    bumpmap_scale: Float,
    force_fresnell: bool,
    reverse: u32,
    /// Also multiply by the cosine when the direction was BRDF-sampled.
    /// Kept switchable while the estimator is validated against a furnace
    /// test; defaults to off.
    cos_correction_for_brdf_sampling: bool,
    sampler: Sampler,
}

impl<'a> PathTracer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scene: &'a Scene,
        camera: &'a Camera,
        xres: u32,
        yres: u32,
        multisample: u32,
        depth: u32,
        clamp: Float,
        russian: Float,
        bumpmap_scale: Float,
        force_fresnell: bool,
        reverse: u32,
        sampler: Sampler,
    ) -> PathTracer<'a> {
        PathTracer {
            scene,
            camera,
            xres,
            yres,
            multisample,
            depth,
            clamp,
            russian,
            bumpmap_scale,
            force_fresnell,
            reverse,
            cos_correction_for_brdf_sampling: false,
            sampler,
        }
    }

    /// Enables the cosine multiply for BRDF-sampled directions. Off by
    /// default; see the transfer-coefficient handling in `generate_path`.
    pub fn with_cos_correction(mut self, enabled: bool) -> PathTracer<'a> {
        self.cos_correction_for_brdf_sampling = enabled;
        self
    }

    /// Traces a subpath. `depth_budget` bounds the number of scatter events
    /// when `russian < 0`; otherwise Russian roulette with survival
    /// probability `russian` terminates the path. Fresnel bounces and
    /// medium transitions are free: they consume neither budget nor
    /// roulette tries.
    fn generate_path(
        &mut self,
        ray: Ray,
        raycount: &mut u64,
        depth_budget: u32,
        russian: Float,
        debug: bool,
    ) -> Vec<PathPoint> {
        let mut path: Vec<PathPoint> = Vec::new();
        let mut current_ray = ray;
        let mut bounces = 0u32;
        let mut total_steps = 0u32;
        let mut skip_russian = false;
        let mut last_triangle: Option<u32> = None;

        loop {
            bounces += 1;
            total_steps += 1;
            if total_steps >= MAX_PATH_LENGTH {
                break;
            }
            if russian >= 0.0 {
                if bounces > 1 && !skip_russian && self.sampler.get_1d() > russian {
                    break;
                }
                skip_russian = false;
            } else if bounces > depth_budget {
                break;
            }

            *raycount += 1;
            let isect = if !self.scene.has_thinglass() {
                self.scene.intersect_excluding(&current_ray, last_triangle)
            } else {
                self.scene
                    .intersect_excluding_with_thinglass(&current_ray, last_triangle)
            };

            let Some(tri_index) = isect.triangle else {
                if debug {
                    eprintln!("path escaped to sky after {} vertices", path.len());
                }
                path.push(PathPoint::sky(-current_ray.direction, isect.thinglass));
                break;
            };

            let triangle = &self.scene.triangles[tri_index as usize];
            let mat_index = triangle.material;
            let mat = &self.scene.materials[mat_index as usize];

            let pos = current_ray.at(isect.t);
            let mut face_n = isect.interpolate(
                triangle.normals[0],
                triangle.normals[1],
                triangle.normals[2],
            );
            if face_n.is_nan() {
                // Some meshes carry broken vertex normals; try each corner
                // before giving up on the ray.
                face_n = triangle
                    .normals
                    .iter()
                    .copied()
                    .find(|n| !n.is_nan())
                    .unwrap_or(Vec3::NAN);
                if face_n.is_nan() {
                    return path;
                }
            }
            // Opposite vertex normals can interpolate to zero length.
            if face_n.length_squared() <= 0.0 {
                return path;
            }
            face_n = face_n.normalize();

            let vr = -current_ray.direction;
            let mut backside = false;
            if face_n.dot(vr) < 0.0 {
                face_n = -face_n;
                backside = true;
            }
            let from_inside = backside;

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

            let mut light_n = face_n;
            if let Some(bump) = mat.bump_texture {
                let bump_tex = &textures[bump as usize];
                let right = bump_tex.slope_right(tex_uv);
                let bottom = bump_tex.slope_bottom(tex_uv);
                let tangent = isect.interpolate(
                    triangle.tangents[0],
                    triangle.tangents[1],
                    triangle.tangents[2],
                );
                // Coincident vertices may carry opposite tangents that
                // cancel under interpolation; skip the bump there.
                if tangent.length_squared() >= 1e-3 {
                    let tangent = tangent.normalize();
                    let bitangent = face_n.cross(tangent).normalize();
                    let tangent2 = bitangent.cross(face_n);
                    let perturbed =
                        face_n + (tangent2 * right + bitangent * bottom) * self.bumpmap_scale;
                    if perturbed.length_squared() > 0.0 {
                        let perturbed = perturbed.normalize();
                        if !perturbed.is_nan() {
                            light_n = perturbed;
                        }
                    }
                }
            }

            // Classify the bounce. One uniform sample drives every decision
            // through decide-and-rescale.
            let mut type_sample = self.sampler.get_1d();
            let kind = if mat.translucency > 0.001 {
                if from_inside {
                    PointKind::Left
                } else {
                    let q = fresnel_dielectric(vr, light_n, 1.0 / mat.refraction_index);
                    if decide_and_rescale(&mut type_sample, q) {
                        PointKind::Reflected
                    } else if decide_and_rescale(&mut type_sample, mat.translucency) {
                        PointKind::Entered
                    } else {
                        PointKind::Scattered
                    }
                }
            } else if self.force_fresnell {
                let specular_sum = specular.r + specular.g + specular.b;
                let strength =
                    specular_sum / (diffuse.r + diffuse.g + diffuse.b + specular_sum).max(1e-6);
                let fresnel = fresnel_dielectric(vr, light_n, 1.0 / mat.refraction_index);
                if decide_and_rescale(&mut type_sample, strength)
                    && decide_and_rescale(&mut type_sample, fresnel)
                {
                    PointKind::Reflected
                } else {
                    PointKind::Scattered
                }
            } else {
                PointKind::Scattered
            };

            // Fresnel bounces and medium transitions do not consume depth
            // and are exempt from roulette at this step.
            let mut kind = kind;
            if kind != PointKind::Scattered {
                bounces -= 1;
                skip_russian = true;
            }

            if debug {
                eprintln!(
                    "bounce {}: hit {} at {:?}, kind {:?}",
                    total_steps, mat.name, pos, kind
                );
            }

            let mut transfer = Rgb::WHITE;
            let mut sampling = SamplingKind::Cosine;
            let mut dir = Vec3::ZERO;
            let mut do_scatter_sample = false;
            match kind {
                PointKind::Scattered => {
                    do_scatter_sample = true;
                }
                PointKind::Reflected => {
                    dir = reflect(vr, light_n);
                    if dir.dot(face_n) <= 0.0 {
                        // The mirror direction would enter the surface;
                        // treat this bounce like a scatter instead.
                        do_scatter_sample = true;
                    }
                }
                PointKind::Entered => {
                    dir = refract(vr, light_n, 1.0 / mat.refraction_index);
                    if dir.is_nan() {
                        kind = PointKind::Reflected;
                        dir = reflect(vr, light_n);
                    }
                }
                PointKind::Left => {
                    dir = refract(vr, light_n, mat.refraction_index);
                    if dir.is_nan() {
                        kind = PointKind::Reflected;
                        dir = reflect(vr, light_n);
                    }
                }
            }
            if do_scatter_sample {
                // Fall back to the geometric normal when the shading normal
                // faces away from the viewer.
                if light_n.dot(vr) <= 0.0 {
                    light_n = face_n;
                }
                let u = self.sampler.get_2d();
                let (d, t, s) = mat.brdf.sample(light_n, vr, diffuse, specular, u);
                dir = d;
                transfer = t;
                sampling = s;
                if dir.dot(face_n) <= 0.0 {
                    // Retry against the geometric normal, then coerce.
                    let (d, t, s) = mat.brdf.sample(face_n, vr, diffuse, specular, u);
                    dir = d;
                    transfer = t;
                    sampling = s;
                    if dir.dot(face_n) <= 0.0 {
                        dir = face_n;
                    }
                }
                debug_assert!(dir.dot(face_n) > 0.0);
            }

            let russian_coefficient = if russian > 0.0 && !skip_russian {
                1.0 / russian
            } else {
                1.0
            };

            if kind == PointKind::Scattered {
                if sampling != SamplingKind::Cosine {
                    // Every estimator carries the cosine, except where the
                    // sampling density already accounts for it.
                    let cos = light_n.dot(dir);
                    if sampling != SamplingKind::Brdf || self.cos_correction_for_brdf_sampling {
                        transfer *= cos;
                    }
                } else {
                    // Cosine sampling: pdf = cos/pi cancels the cosine, so
                    // only the pi remains.
                    transfer *= PI;
                }
                if sampling != SamplingKind::Brdf {
                    transfer *= mat.brdf.apply(diffuse, specular, light_n, dir, vr);
                }
                if sampling == SamplingKind::Uniform {
                    transfer *= PI / 0.5;
                }
            }

            path.push(PathPoint {
                pos,
                face_n,
                light_n,
                vr,
                kind,
                backside,
                infinity: false,
                material: mat_index,
                diffuse,
                specular,
                transfer,
                russian_coefficient,
                light_from_source: Rgb::BLACK,
                thinglass: isect.thinglass,
            });

            let offset_sign = if kind == PointKind::Entered || kind == PointKind::Left {
                -1.0
            } else {
                1.0
            };
            current_ray = Ray::new(
                pos + face_n * self.scene.epsilon * 10.0 * offset_sign,
                dir.normalize(),
            );
            last_triangle = Some(tri_index);
        }

        path
    }

    fn trace_path(&mut self, ray: &Ray, raycount: &mut u64, debug: bool) -> PixelRenderResult {
        let mut result = PixelRenderResult::default();
        let camera_pos = ray.origin;

        // Forward path from the camera.
        let path = self.generate_path(*ray, raycount, self.depth, self.russian, debug);

        // Choose the main light and its outgoing direction. The sample
        // stream is consumed even when the scene has no lights so pixel
        // streams stay aligned.
        let areal_sample = self.sampler.get_2d();
        let lightdir_sample = self.sampler.get_2d();
        let _spare = self.sampler.get_2d();
        let select = self.sampler.get_1d();
        let mut lights = Vec::new();
        if let Some(light) = self.scene.pick_light(select, areal_sample) {
            lights.push(light);
        }

        // Light subpath, traced with fixed depth and no roulette.
        let mut light_path: Vec<PathPoint> = Vec::new();
        let mut main_light_dir = Vec3::Z;
        if let Some(main_light) = lights.first_mut() {
            if main_light.kind == LightKind::FullSphere {
                let sphere_dir = sample_sphere_uniform(areal_sample);
                main_light.pos += main_light.size * sphere_dir;
                main_light_dir =
                    sample_hemisphere_cosine_directed(lightdir_sample, sphere_dir.normalize());
            } else {
                main_light_dir =
                    sample_hemisphere_cosine_directed(lightdir_sample, main_light.normal);
            }
            let light_ray = Ray::new(
                main_light.pos + self.scene.epsilon * main_light.normal * 100.0,
                main_light_dir,
            );
            light_path = self.generate_path(light_ray, raycount, self.reverse, -1.0, debug);
        }

        // Carry emitted radiance along the light subpath, connecting each
        // scattered vertex to the camera as a splat.
        if let Some(main_light) = lights.first() {
            let mut carried = Rgb::BLACK;
            for (index, point) in light_path.iter_mut().enumerate() {
                if index == 0 {
                    carried = main_light.color
                        * main_light.intensity
                        * main_light.directional_factor(main_light_dir);
                }
                carried = apply_thinglass(self.scene, carried, &point.thinglass, point.vr);
                point.light_from_source = carried;

                if point.kind == PointKind::Scattered
                    && !point.infinity
                    && self.scene.visibility(point.pos, camera_pos)
                {
                    let direction = (point.pos - camera_pos).normalize();
                    let mat = &self.scene.materials[point.material as usize];
                    let f = mat.brdf.apply(
                        point.diffuse,
                        point.specular,
                        point.light_n,
                        point.vr,
                        -direction,
                    );
                    let g = point.light_n.dot(-direction).max(0.0)
                        / camera_pos.distance_squared(point.pos);
                    let deposit = point.light_from_source * f;
                    if g >= MIN_SPLAT_G && !deposit.has_nan() {
                        if let Some((x, y)) = self.camera.project(direction, self.xres, self.yres)
                        {
                            if debug {
                                eprintln!("light subpath splat at ({}, {})", x, y);
                            }
                            result.splats.push(Splat {
                                x,
                                y,
                                radiance: deposit * g,
                            });
                        }
                    }
                }

                match point.kind {
                    PointKind::Scattered => {
                        carried = carried * point.transfer * point.russian_coefficient;
                    }
                    PointKind::Reflected | PointKind::Left => {}
                    PointKind::Entered => {
                        carried = carried * point.diffuse;
                    }
                }
            }
        }

        // Integrate the forward path back to front.
        let mut from_next = Rgb::BLACK;
        for (index, point) in path.iter().enumerate().rev() {
            let last = index == path.len() - 1;
            if point.infinity {
                let sky = self.scene.sky_radiance(-point.vr);
                from_next = apply_thinglass(self.scene, sky, &point.thinglass, -point.vr);
                continue;
            }

            let mat = &self.scene.materials[point.material as usize];
            let mut total = Rgb::BLACK;

            match point.kind {
                PointKind::Scattered => {
                    // Direct lighting.
                    for light in &lights {
                        let crossed = if !self.scene.has_thinglass() {
                            if self.scene.visibility(light.pos, point.pos) {
                                Some(Vec::new())
                            } else {
                                None
                            }
                        } else {
                            self.scene.visibility_with_thinglass(light.pos, point.pos)
                        };
                        let Some(crossed) = crossed else {
                            continue;
                        };
                        let vi = (light.pos - point.pos).normalize();
                        let f = mat
                            .brdf
                            .apply(point.diffuse, point.specular, point.light_n, vi, point.vr);
                        let g = point.light_n.dot(vi).max(0.0)
                            / light.pos.distance_squared(point.pos);
                        let mut incoming =
                            light.color * light.intensity * light.directional_factor(-vi);
                        incoming = apply_thinglass(self.scene, incoming, &crossed, vi);
                        total += incoming * f * g;
                    }

                    // Connections to the light subpath.
                    for l in &light_path {
                        if !l.infinity && self.scene.visibility(l.pos, point.pos) {
                            let light_to_p = (point.pos - l.pos).normalize();
                            let p_to_light = -light_to_p;
                            let l_mat = &self.scene.materials[l.material as usize];
                            let f_light = l_mat.brdf.apply(
                                l.diffuse,
                                l.specular,
                                l.light_n,
                                light_to_p,
                                l.vr,
                            );
                            let f_point = mat.brdf.apply(
                                point.diffuse,
                                point.specular,
                                point.light_n,
                                point.vr,
                                p_to_light,
                            );
                            let g = point.light_n.dot(p_to_light).max(0.0)
                                / l.pos.distance_squared(point.pos);
                            total += l.light_from_source * f_light * f_point * g;
                        }
                    }

                    // Indirect lighting from the rest of the path.
                    if !last {
                        total += from_next * point.russian_coefficient * point.transfer;
                    }
                }
                PointKind::Reflected | PointKind::Left => {
                    total += from_next;
                }
                PointKind::Entered => {
                    // The medium acts as a colored filter.
                    total += from_next * point.diffuse;
                }
            }

            if mat.emissive && !point.backside {
                total += mat.emission;
            }

            // Filters crossed by the ray that found this vertex.
            total = apply_thinglass(self.scene, total, &point.thinglass, point.vr);

            total = total.clamped(self.clamp).sanitized();
            from_next = total;
        }

        result.main = from_next;
        result
    }
}

/// Colored transmittance of the thin-glass panes crossed by a ray. Panes
/// closer together than the scene epsilon along `t` are treated as kd-tree
/// clones of one pane and filtered once. The filter applies only to panes
/// whose front face the ray enters.
fn apply_thinglass(scene: &Scene, input: Rgb, isects: &[(u32, Float)], ray_direction: Vec3) -> Rgb {
    if isects.is_empty() {
        return input;
    }
    let mut sorted = isects.to_vec();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    let mut result = input;
    let mut last_t = -1.0;
    for (index, t) in sorted {
        if t <= last_t + scene.epsilon {
            continue;
        }
        last_t = t;
        let triangle = &scene.triangles[index as usize];
        if triangle.face_normal().dot(ray_direction) >= 0.0 {
            result = result * scene.materials[triangle.material as usize].diffuse;
        }
    }
    result
}

impl TracerI for PathTracer<'_> {
    fn render_pixel(
        &mut self,
        x: u32,
        y: u32,
        raycount: &mut u64,
        debug: bool,
    ) -> PixelRenderResult {
        let mut total = PixelRenderResult::default();
        for _ in 0..self.multisample {
            self.sampler.advance();
            let coords = self.sampler.get_2d();
            let ray = if self.camera.is_simple() {
                self.camera.primary_ray(x, y, self.xres, self.yres, coords)
            } else {
                let lens = self.sampler.get_2d();
                self.camera
                    .lens_ray(x, y, self.xres, self.yres, coords, lens)
            };
            let sample = self.trace_path(&ray, raycount, debug);
            total.main += sample.main;
            total.splats.extend(sample.splats);
            if debug {
                eprintln!("sampler elements used for this sample: {}", self.sampler.usage());
            }
        }
        let scale = 1.0 / self.multisample as Float;
        total.main *= scale;
        for splat in &mut total.splats {
            splat.radiance *= scale;
        }
        total
    }
}
