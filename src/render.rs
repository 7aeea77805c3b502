use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use log::info;

use crate::{
    camera::Camera,
    color::Rgb,
    config::{Config, SamplerKind, TracerKind},
    film::Film,
    monitor,
    path_tracer::PathTracer,
    sampler::Sampler,
    scene::Scene,
    texture::Texture,
    tile::{partition_sorted, RenderTask, TILE_SIZE},
    tracer::{Tracer, TracerI},
    whitted::WhittedTracer,
};

/// Pixel-progress updates are batched to keep atomic traffic low.
const PROGRESS_BATCH: usize = 100;

/// Renders the committed scene: partitions the image into tiles sorted
/// center-out, dispatches them FIFO to a worker pool sized one below the
/// machine's parallelism, and runs the monitor thread alongside. Returns
/// the final framebuffer.
pub fn render(
    scene: &Scene,
    camera: &Camera,
    config: &Config,
    preview_path: &Path,
    debug_pixel: Option<(u32, u32)>,
) -> Texture {
    let film = Arc::new(Film::new(config.xres as usize, config.yres as usize));
    film.fill_stripes(15, Rgb::splat(0.6), Rgb::splat(0.5));

    let tasks = partition_sorted(config.xres, config.yres, TILE_SIZE);
    info!("rendering in {} tiles", tasks.len());

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1);
    info!("using a worker pool of size {}", workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .expect("worker pool construction failed");

    let stop = Arc::new(AtomicBool::new(false));
    let monitor_handle = monitor::spawn(film.clone(), preview_path.to_path_buf(), stop.clone());

    pool.scope_fifo(|scope| {
        for (index, task) in tasks.iter().enumerate() {
            let film = film.clone();
            scope.spawn_fifo(move |_| {
                render_task(scene, camera, config, *task, index as u64, &film, debug_pixel);
            });
        }
    });

    stop.store(true, Ordering::Relaxed);
    if monitor_handle.join().is_err() {
        log::warn!("monitor thread panicked");
    }

    film.snapshot()
}

fn render_task(
    scene: &Scene,
    camera: &Camera,
    config: &Config,
    task: RenderTask,
    task_index: u64,
    film: &Film,
    debug_pixel: Option<(u32, u32)>,
) {
    let mut tracer = make_tracer(scene, camera, config, task_index);
    let mut pixels = Vec::with_capacity(task.pixel_count() as usize);
    let mut splats = Vec::new();
    let mut rays = 0u64;
    let mut pending = 0usize;

    for y in task.y0..task.y1 {
        for x in task.x0..task.x1 {
            let debug = debug_pixel == Some((x, y));
            let result = tracer.render_pixel(x, y, &mut rays, debug);
            pixels.push(result.main);
            splats.extend(result.splats);
            pending += 1;
            if pending == PROGRESS_BATCH {
                film.pixels_done.fetch_add(PROGRESS_BATCH, Ordering::Relaxed);
                pending = 0;
            }
        }
    }

    film.merge_tile(&task, &pixels);
    film.add_splats(&splats);
    film.pixels_done.fetch_add(pending, Ordering::Relaxed);
    film.rays.fetch_add(rays, Ordering::Relaxed);
    film.tasks_done.fetch_add(1, Ordering::Relaxed);
}

fn make_tracer<'a>(
    scene: &'a Scene,
    camera: &'a Camera,
    config: &Config,
    task_index: u64,
) -> Tracer<'a> {
    // Distinct, deterministic per-tile seeds.
    let seed = task_index.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(1);
    match config.tracer {
        TracerKind::Whitted => Tracer::Whitted(WhittedTracer::new(
            scene,
            camera,
            config.xres,
            config.yres,
            config.multisample,
            config.recursion_level,
            config.bumpmap_scale,
            seed,
        )),
        TracerKind::Path => {
            let sampler = match config.sampler {
                SamplerKind::Independent => Sampler::independent(seed),
                SamplerKind::Stratified => Sampler::stratified(seed, config.multisample),
            };
            Tracer::Path(PathTracer::new(
                scene,
                camera,
                config.xres,
                config.yres,
                config.multisample,
                config.recursion_level,
                config.clamp,
                config.russian,
                config.bumpmap_scale,
                config.force_fresnell,
                config.reverse,
                sampler,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;

    use super::*;

    #[test]
    fn whitted_sky_render_covers_every_pixel() {
        let text = r#"{
            "output_file": "out.png",
            "xres": 64, "yres": 48,
            "view_point": [0, 0, 5], "look_at": [0, 0, 0], "yview": 1.0,
            "sky_color": [0.2, 0.4, 0.8],
            "tracer": "whitted"
        }"#;
        let config = Config::from_json(text).unwrap();
        let mut scene = Scene::new();
        scene.sky_color = Rgb::new(0.2, 0.4, 0.8);
        scene.commit();
        let camera = Camera::new(
            glam::Vec3::new(0.0, 0.0, 5.0),
            glam::Vec3::ZERO,
            glam::Vec3::Y,
            config.yview,
            config.xview(),
            config.focus_plane,
            config.lens_size,
        );
        let preview = std::env::temp_dir().join(format!(
            "lumen_render_test_{}.preview.png",
            std::process::id()
        ));
        let image = render(&scene, &camera, &config, &preview, None);
        std::fs::remove_file(&preview).ok();
        assert_eq!(image.width(), 64);
        assert_eq!(image.height(), 48);
        for p in image.pixels() {
            assert_eq!(*p, Rgb::new(0.2, 0.4, 0.8));
        }
    }
}
