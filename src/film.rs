use std::sync::{
    atomic::{AtomicU64, AtomicUsize},
    Mutex,
};

use crate::{color::Rgb, texture::Texture, tile::RenderTask};

/// Radiance deposited at an arbitrary pixel by a light subpath; these land
/// outside the tile that generated them.
#[derive(Debug, Clone, Copy)]
pub struct Splat {
    pub x: u32,
    pub y: u32,
    pub radiance: Rgb,
}

struct Buffers {
    /// Camera-path radiance; each pixel is written exactly once, by the
    /// worker that owns its tile.
    main: Vec<Rgb>,
    /// Light-subpath deposits, accumulated additively.
    splat: Vec<Rgb>,
}

/// Shared framebuffer. Workers render tiles into private buffers and merge
/// them here when a tile completes, so the lock is taken once per tile
/// rather than once per pixel. Progress counters are plain atomics; the
/// monitor polls them and takes racy but harmless snapshots for previews.
pub struct Film {
    width: usize,
    height: usize,
    buffers: Mutex<Buffers>,
    pub pixels_done: AtomicUsize,
    pub tasks_done: AtomicUsize,
    pub rays: AtomicU64,
}

impl Film {
    pub fn new(width: usize, height: usize) -> Film {
        Film {
            width,
            height,
            buffers: Mutex::new(Buffers {
                main: vec![Rgb::BLACK; width * height],
                splat: vec![Rgb::BLACK; width * height],
            }),
            pixels_done: AtomicUsize::new(0),
            tasks_done: AtomicUsize::new(0),
            rays: AtomicU64::new(0),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total_pixels(&self) -> usize {
        self.width * self.height
    }

    /// Pre-fills the main buffer so previews show unrendered regions as a
    /// stripe pattern.
    pub fn fill_stripes(&self, stripe_width: usize, a: Rgb, b: Rgb) {
        let mut buffers = self.buffers.lock().unwrap();
        for y in 0..self.height {
            for x in 0..self.width {
                let c = if ((x + y) / stripe_width) % 2 == 0 { a } else { b };
                buffers.main[y * self.width + x] = c;
            }
        }
    }

    /// Writes a finished tile. `pixels` is the tile's row-major contents.
    pub fn merge_tile(&self, task: &RenderTask, pixels: &[Rgb]) {
        debug_assert_eq!(pixels.len() as u64, task.pixel_count());
        let mut buffers = self.buffers.lock().unwrap();
        let tile_width = task.width() as usize;
        for row in 0..task.height() as usize {
            let src = &pixels[row * tile_width..(row + 1) * tile_width];
            let dst_start = (task.y0 as usize + row) * self.width + task.x0 as usize;
            buffers.main[dst_start..dst_start + tile_width].copy_from_slice(src);
        }
    }

    pub fn add_splats(&self, splats: &[Splat]) {
        if splats.is_empty() {
            return;
        }
        let mut buffers = self.buffers.lock().unwrap();
        for s in splats {
            let index = s.y as usize * self.width + s.x as usize;
            buffers.splat[index] += s.radiance;
        }
    }

    /// Current image: camera radiance plus splats, sanitized per pixel.
    pub fn snapshot(&self) -> Texture {
        let buffers = self.buffers.lock().unwrap();
        let pixels = buffers
            .main
            .iter()
            .zip(buffers.splat.iter())
            .map(|(m, s)| (*m + *s).sanitized())
            .collect();
        Texture::from_pixels(self.width, self.height, pixels)
    }

    /// Pixels per second and similar throughput figures use this elapsed
    /// ray total.
    pub fn ray_total(&self) -> u64 {
        self.rays.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::{tile::partition, Float};

    use super::*;

    #[test]
    fn tiles_cover_every_pixel_exactly_once() {
        let film = Film::new(401, 199);
        let tasks = partition(401, 199, 200);
        assert_eq!(tasks.len(), 6);
        let mut written: u64 = 0;
        for task in &tasks {
            let marker = vec![Rgb::WHITE; task.pixel_count() as usize];
            film.merge_tile(task, &marker);
            written += task.pixel_count();
        }
        assert_eq!(written, 401 * 199);
        let snap = film.snapshot();
        assert!(snap.pixels().iter().all(|&p| p == Rgb::WHITE));
    }

    #[test]
    fn splats_accumulate_additively() {
        let film = Film::new(4, 4);
        let s = Splat {
            x: 1,
            y: 2,
            radiance: Rgb::new(0.5, 0.0, 0.0),
        };
        film.add_splats(&[s, s]);
        let snap = film.snapshot();
        assert!((snap.get_pixel(1, 2).r - 1.0).abs() < 1e-6);
        assert_eq!(snap.get_pixel(0, 0), Rgb::BLACK);
    }

    #[test]
    fn snapshot_sanitizes_output() {
        let film = Film::new(2, 1);
        let task = RenderTask {
            xres: 2,
            yres: 1,
            x0: 0,
            x1: 2,
            y0: 0,
            y1: 1,
        };
        film.merge_tile(&task, &[Rgb::new(Float::NAN, -2.0, 1.0), Rgb::WHITE]);
        let snap = film.snapshot();
        assert_eq!(snap.get_pixel(0, 0), Rgb::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn counters_start_at_zero() {
        let film = Film::new(8, 8);
        assert_eq!(film.pixels_done.load(Ordering::Relaxed), 0);
        assert_eq!(film.ray_total(), 0);
    }
}
