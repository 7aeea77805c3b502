use std::path::Path;

use glam::Vec2;

use crate::{color::Rgb, Float};

/// Decoded images arrive in sRGB; this exponent linearizes them.
const GAMMA: Float = 2.2;

/// A 2D grid of linear RGB values. Serves three roles: decoded material
/// textures (bilinear sampling, bump slopes), the render framebuffer, and
/// the encoder for preview/final output.
#[derive(Debug, Clone)]
pub struct Texture {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Texture {
    pub fn new(width: usize, height: usize) -> Texture {
        Texture {
            width,
            height,
            pixels: vec![Rgb::BLACK; width * height],
        }
    }

    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Rgb>) -> Texture {
        assert_eq!(pixels.len(), width * height);
        Texture {
            width,
            height,
            pixels,
        }
    }

    /// Decodes an image file into linear space.
    pub fn load(path: &Path) -> Result<Texture, image::ImageError> {
        let img = image::open(path)?.to_rgb32f();
        let (width, height) = (img.width() as usize, img.height() as usize);
        let pixels = img
            .pixels()
            .map(|p| Rgb::new(p.0[0].powf(GAMMA), p.0[1].powf(GAMMA), p.0[2].powf(GAMMA)))
            .collect();
        Ok(Texture {
            width,
            height,
            pixels,
        })
    }

    /// Encodes to an 8-bit image file; the format follows the extension.
    /// Applies gamma, so stored pixels are expected to be linear radiance.
    pub fn write(&self, path: &Path) -> Result<(), image::ImageError> {
        let encode = |v: Float| (v.max(0.0).powf(1.0 / GAMMA).min(1.0) * 255.0 + 0.5) as u8;
        let img = image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let p = self.get_pixel(x as usize, y as usize);
            image::Rgb([encode(p.r), encode(p.g), encode(p.b)])
        });
        img.save(path)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Rgb {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, c: Rgb) {
        self.pixels[y * self.width + x] = c;
    }

    /// Bilinear sample with wrap-around addressing; `uv` may lie anywhere.
    pub fn sample_bilinear(&self, uv: Vec2) -> Rgb {
        let gx = (uv.x - uv.x.floor()) * self.width as Float;
        let gy = (uv.y - uv.y.floor()) * self.height as Float;
        let x0 = (gx as usize).min(self.width - 1);
        let y0 = (gy as usize).min(self.height - 1);
        let fx = gx - x0 as Float;
        let fy = gy - y0 as Float;
        let x1 = (x0 + 1) % self.width;
        let y1 = (y0 + 1) % self.height;
        let top = self.get_pixel(x0, y0) * (1.0 - fx) + self.get_pixel(x1, y0) * fx;
        let bottom = self.get_pixel(x0, y1) * (1.0 - fx) + self.get_pixel(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Grayscale finite difference toward the next texel to the right.
    pub fn slope_right(&self, uv: Vec2) -> Float {
        let (x, y) = self.texel(uv);
        let x1 = (x + 1) % self.width;
        self.get_pixel(x1, y).grayscale() - self.get_pixel(x, y).grayscale()
    }

    /// Grayscale finite difference toward the next texel below.
    pub fn slope_bottom(&self, uv: Vec2) -> Float {
        let (x, y) = self.texel(uv);
        let y1 = (y + 1) % self.height;
        self.get_pixel(x, y1).grayscale() - self.get_pixel(x, y).grayscale()
    }

    fn texel(&self, uv: Vec2) -> (usize, usize) {
        let x = ((uv.x - uv.x.floor()) * self.width as Float) as usize;
        let y = ((uv.y - uv.y.floor()) * self.height as Float) as usize;
        (x.min(self.width - 1), y.min(self.height - 1))
    }

    /// Fills the grid with diagonal stripes; used to pre-fill the
    /// framebuffer so previews show unrendered regions distinctly.
    pub fn fill_stripes(&mut self, stripe_width: usize, a: Rgb, b: Rgb) {
        for y in 0..self.height {
            for x in 0..self.width {
                let c = if ((x + y) / stripe_width) % 2 == 0 { a } else { b };
                self.set_pixel(x, y, c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Texture {
        let mut t = Texture::new(2, 2);
        t.set_pixel(0, 0, Rgb::WHITE);
        t.set_pixel(1, 1, Rgb::WHITE);
        t
    }

    #[test]
    fn bilinear_blends_neighbours() {
        let t = checker();
        // A point halfway between lattice sites blends all four texels.
        let c = t.sample_bilinear(Vec2::new(0.25, 0.25));
        assert!((c.r - 0.5).abs() < 1e-5);
        // Texel origin returns the texel itself.
        let c = t.sample_bilinear(Vec2::new(0.0, 0.0));
        assert_eq!(c, Rgb::WHITE);
    }

    #[test]
    fn sampling_wraps_around() {
        let t = checker();
        let a = t.sample_bilinear(Vec2::new(0.25, 0.25));
        let b = t.sample_bilinear(Vec2::new(1.25, -0.75));
        assert!((a.r - b.r).abs() < 1e-5);
    }

    #[test]
    fn slopes_measure_grayscale_steps() {
        let t = checker();
        // From white texel (0,0) to black texel (1,0).
        assert!((t.slope_right(Vec2::new(0.0, 0.0)) + 1.0).abs() < 1e-5);
        assert!((t.slope_bottom(Vec2::new(0.0, 0.0)) + 1.0).abs() < 1e-5);
        // From black texel (1,0) wrapping back to white (0,0).
        assert!((t.slope_right(Vec2::new(0.5, 0.0)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn stripes_alternate() {
        let mut t = Texture::new(8, 1);
        t.fill_stripes(2, Rgb::WHITE, Rgb::BLACK);
        assert_eq!(t.get_pixel(0, 0), Rgb::WHITE);
        assert_eq!(t.get_pixel(2, 0), Rgb::BLACK);
        assert_eq!(t.get_pixel(4, 0), Rgb::WHITE);
    }
}
