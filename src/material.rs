use crate::{brdf::Brdf, color::Rgb, Float};

/// Surface description. Texture fields are indices into the scene's texture
/// array; the BRDF is baked at load time from the material's exponent and
/// the configured reflectance model.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub ambient: Rgb,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub ambient_texture: Option<u32>,
    pub diffuse_texture: Option<u32>,
    pub specular_texture: Option<u32>,
    pub bump_texture: Option<u32>,
    pub exponent: Float,
    pub refraction_index: Float,
    /// Weight in [0, 1]; positive values make the surface translucent.
    pub translucency: Float,
    pub emissive: bool,
    pub emission: Rgb,
    /// Marks a purely transmissive colored filter; see the thin-glass
    /// handling in the path tracer.
    pub thinglass: bool,
    pub brdf: Brdf,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            name: "default".to_string(),
            ambient: Rgb::splat(0.1),
            diffuse: Rgb::splat(0.7),
            specular: Rgb::BLACK,
            ambient_texture: None,
            diffuse_texture: None,
            specular_texture: None,
            bump_texture: None,
            exponent: 1.0,
            refraction_index: 1.0,
            translucency: 0.0,
            emissive: false,
            emission: Rgb::BLACK,
            thinglass: false,
            brdf: Brdf::Diffuse,
        }
    }
}

impl Material {
    pub fn has_any_texture(&self) -> bool {
        self.ambient_texture.is_some()
            || self.diffuse_texture.is_some()
            || self.specular_texture.is_some()
            || self.bump_texture.is_some()
    }
}
