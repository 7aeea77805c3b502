use crate::{color::Rgb, film::Splat, path_tracer::PathTracer, whitted::WhittedTracer};

/// Everything one pixel's worth of sampling produced: the radiance for the
/// pixel itself plus any splats light subpaths deposited elsewhere.
#[derive(Debug, Default)]
pub struct PixelRenderResult {
    pub main: Rgb,
    pub splats: Vec<Splat>,
}

/// A light transport algorithm. One tracer instance exists per render
/// worker; it may carry mutable per-worker state (sampler, shadow cache).
pub trait TracerI {
    /// Renders pixel `(x, y)`, returning its radiance and side effects.
    /// `raycount` is bumped for every scene query issued.
    fn render_pixel(&mut self, x: u32, y: u32, raycount: &mut u64, debug: bool)
        -> PixelRenderResult;
}

pub enum Tracer<'a> {
    Whitted(WhittedTracer<'a>),
    Path(PathTracer<'a>),
}

impl TracerI for Tracer<'_> {
    fn render_pixel(
        &mut self,
        x: u32,
        y: u32,
        raycount: &mut u64,
        debug: bool,
    ) -> PixelRenderResult {
        match self {
            Tracer::Whitted(t) => t.render_pixel(x, y, raycount, debug),
            Tracer::Path(t) => t.render_pixel(x, y, raycount, debug),
        }
    }
}
