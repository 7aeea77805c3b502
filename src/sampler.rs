use glam::Vec2;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::Float;

/// Per-pixel sample stream. `advance` starts the next sample; `get_1d` and
/// `get_2d` each consume one element of the stream, and `usage` reports how
/// many elements the current sample has consumed so far. Each render worker
/// owns its sampler; none of this is shared.
pub trait SamplerI {
    fn advance(&mut self);
    fn get_1d(&mut self) -> Float;
    fn get_2d(&mut self) -> Vec2;
    fn usage(&self) -> u32;
}

#[derive(Debug, Clone)]
pub enum Sampler {
    Independent(IndependentSampler),
    Stratified(StratifiedSampler),
}

impl Sampler {
    pub fn independent(seed: u64) -> Sampler {
        Sampler::Independent(IndependentSampler::new(seed))
    }

    pub fn stratified(seed: u64, samples_per_pixel: u32) -> Sampler {
        Sampler::Stratified(StratifiedSampler::new(seed, samples_per_pixel))
    }
}

impl SamplerI for Sampler {
    fn advance(&mut self) {
        match self {
            Sampler::Independent(s) => s.advance(),
            Sampler::Stratified(s) => s.advance(),
        }
    }

    fn get_1d(&mut self) -> Float {
        match self {
            Sampler::Independent(s) => s.get_1d(),
            Sampler::Stratified(s) => s.get_1d(),
        }
    }

    fn get_2d(&mut self) -> Vec2 {
        match self {
            Sampler::Independent(s) => s.get_2d(),
            Sampler::Stratified(s) => s.get_2d(),
        }
    }

    fn usage(&self) -> u32 {
        match self {
            Sampler::Independent(s) => s.usage(),
            Sampler::Stratified(s) => s.usage(),
        }
    }
}

/// Plain uniform pseudorandom stream.
#[derive(Debug, Clone)]
pub struct IndependentSampler {
    rng: SmallRng,
    used: u32,
}

impl IndependentSampler {
    pub fn new(seed: u64) -> IndependentSampler {
        IndependentSampler {
            rng: SmallRng::seed_from_u64(seed),
            used: 0,
        }
    }
}

impl SamplerI for IndependentSampler {
    fn advance(&mut self) {
        self.used = 0;
    }

    fn get_1d(&mut self) -> Float {
        self.used += 1;
        self.rng.gen()
    }

    fn get_2d(&mut self) -> Vec2 {
        self.used += 1;
        Vec2::new(self.rng.gen(), self.rng.gen())
    }

    fn usage(&self) -> u32 {
        self.used
    }
}

/// Stratifies the first 2D draw of every sample over a
/// `strata x strata` grid, cycling through the cells as `advance` is called.
/// With `samples_per_pixel` matching the grid size this jitters each pixel's
/// primary rays over disjoint subpixel cells; later dimensions fall back to
/// the uniform stream.
#[derive(Debug, Clone)]
pub struct StratifiedSampler {
    rng: SmallRng,
    strata: u32,
    sample_index: u32,
    first_2d_taken: bool,
    used: u32,
}

impl StratifiedSampler {
    pub fn new(seed: u64, samples_per_pixel: u32) -> StratifiedSampler {
        let strata = (samples_per_pixel.max(1) as Float).sqrt().ceil() as u32;
        StratifiedSampler {
            rng: SmallRng::seed_from_u64(seed),
            strata,
            sample_index: 0,
            first_2d_taken: false,
            used: 0,
        }
    }
}

impl SamplerI for StratifiedSampler {
    fn advance(&mut self) {
        self.sample_index = (self.sample_index + 1) % (self.strata * self.strata);
        self.first_2d_taken = false;
        self.used = 0;
    }

    fn get_1d(&mut self) -> Float {
        self.used += 1;
        self.rng.gen()
    }

    fn get_2d(&mut self) -> Vec2 {
        self.used += 1;
        if self.first_2d_taken {
            return Vec2::new(self.rng.gen(), self.rng.gen());
        }
        self.first_2d_taken = true;
        let cell_x = self.sample_index % self.strata;
        let cell_y = self.sample_index / self.strata;
        let jitter: Vec2 = Vec2::new(self.rng.gen(), self.rng.gen());
        (Vec2::new(cell_x as Float, cell_y as Float) + jitter) / self.strata as Float
    }

    fn usage(&self) -> u32 {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_counts_draws_since_advance() {
        let mut s = Sampler::independent(42);
        s.advance();
        s.get_1d();
        s.get_2d();
        s.get_1d();
        assert_eq!(s.usage(), 3);
        s.advance();
        assert_eq!(s.usage(), 0);
    }

    #[test]
    fn samples_stay_in_unit_interval() {
        let mut s = Sampler::independent(7);
        for _ in 0..1000 {
            let v = s.get_1d();
            assert!((0.0..1.0).contains(&v));
            let p = s.get_2d();
            assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y));
        }
    }

    #[test]
    fn stratified_first_draw_covers_cells() {
        let spp = 16;
        let mut s = Sampler::stratified(3, spp);
        let mut seen = vec![false; spp as usize];
        for _ in 0..spp {
            s.advance();
            let p = s.get_2d();
            assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y));
            let cell = (p.y * 4.0) as usize * 4 + (p.x * 4.0) as usize;
            seen[cell] = true;
        }
        assert!(seen.iter().all(|&c| c));
    }
}
