use glam::Vec2;
use itertools::Itertools;

use crate::Float;

/// Edge length of the square tiles the image is partitioned into.
pub const TILE_SIZE: u32 = 200;

/// Immutable description of one rectangular render unit:
/// `[x0, x1) x [y0, y1)` within an `xres x yres` image.
#[derive(Debug, Clone, Copy)]
pub struct RenderTask {
    pub xres: u32,
    pub yres: u32,
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl RenderTask {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn midpoint(&self) -> Vec2 {
        Vec2::new(
            (self.x0 + self.x1) as Float / 2.0,
            (self.y0 + self.y1) as Float / 2.0,
        )
    }
}

/// Splits the image into tiles of at most `tile_size` on a side; edge tiles
/// are clipped to the image bounds.
pub fn partition(xres: u32, yres: u32, tile_size: u32) -> Vec<RenderTask> {
    let mut tasks = Vec::new();
    let mut y = 0;
    while y < yres {
        let mut x = 0;
        while x < xres {
            tasks.push(RenderTask {
                xres,
                yres,
                x0: x,
                x1: (x + tile_size).min(xres),
                y0: y,
                y1: (y + tile_size).min(yres),
            });
            x += tile_size;
        }
        y += tile_size;
    }
    tasks
}

/// Tiles ordered by distance from the image center, closest first, so the
/// preview fills in the area the viewer most likely cares about.
pub fn partition_sorted(xres: u32, yres: u32, tile_size: u32) -> Vec<RenderTask> {
    let middle = Vec2::new(xres as Float / 2.0, yres as Float / 2.0);
    partition(xres, yres, tile_size)
        .into_iter()
        .sorted_by(|a, b| {
            let da = middle.distance(a.midpoint());
            let db = middle.distance(b.midpoint());
            da.partial_cmp(&db).unwrap()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_resolution_clips_edge_tiles() {
        let tasks = partition(401, 199, 200);
        assert_eq!(tasks.len(), 6);
        let total: u64 = tasks.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total, 401 * 199);
        assert!(tasks.iter().all(|t| t.x1 <= 401 && t.y1 <= 199));
    }

    #[test]
    fn sorted_tiles_start_at_center() {
        let tasks = partition_sorted(1000, 1000, 200);
        let middle = Vec2::new(500.0, 500.0);
        let first = middle.distance(tasks.first().unwrap().midpoint());
        let last = middle.distance(tasks.last().unwrap().midpoint());
        assert!(first <= last);
        // Center tile midpoint coincides with the image center.
        assert!(first < 1e-4);
    }

    #[test]
    fn tiles_are_disjoint_and_cover_everything() {
        let tasks = partition(64, 48, 20);
        let mut hits = vec![0u8; 64 * 48];
        for t in &tasks {
            for y in t.y0..t.y1 {
                for x in t.x0..t.x1 {
                    hits[(y * 64 + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
    }
}
