use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use crate::film::Film;

/// How often the progress bar is redrawn.
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
/// Preview image flush period, in redraw ticks.
const PREVIEW_EVERY: u32 = 10;

/// Starts the monitor thread: redraws a progress bar while tiles render,
/// periodically flushes a preview image, and prints throughput statistics
/// once rendering finishes. The caller sets `stop` after joining the
/// worker pool.
pub fn spawn(film: Arc<Film>, preview_path: PathBuf, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || monitor_loop(&film, &preview_path, &stop))
}

fn monitor_loop(film: &Film, preview_path: &Path, stop: &AtomicBool) {
    let total = film.total_pixels() as u64;
    let start = Instant::now();
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("Rendered {pos}/{len} pixels [{bar:60}] {percent:>3}% done")
            .expect("static progress template")
            .progress_chars("#-"),
    );

    let mut tick = 0u32;
    loop {
        let done = film.pixels_done.load(Ordering::Relaxed) as u64;
        bar.set_position(done.min(total));
        if stop.load(Ordering::Relaxed) || done >= total {
            break;
        }
        if tick % PREVIEW_EVERY == 0 {
            write_preview(film, preview_path);
        }
        thread::sleep(REDRAW_INTERVAL);
        tick += 1;
    }

    bar.set_position((film.pixels_done.load(Ordering::Relaxed) as u64).min(total));
    bar.finish();
    write_preview(film, preview_path);

    let seconds = start.elapsed().as_secs_f32().max(1e-6);
    let rays = film.ray_total();
    println!("Total rendering time: {:.2}s", seconds);
    println!("Total pixels: {}, total rays: {}", total, rays);
    println!(
        "Average pixels per second: {:.0}",
        total as f32 / seconds
    );
    println!("Average rays per second: {:.0}", rays as f32 / seconds);
}

fn write_preview(film: &Film, preview_path: &Path) {
    if let Err(err) = film.snapshot().write(preview_path) {
        warn!("preview write to {} failed: {}", preview_path.display(), err);
    }
}
