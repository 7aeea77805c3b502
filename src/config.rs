use std::path::Path;

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    color::Rgb,
    light::{Light, LightKind},
    Float,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TracerKind {
    Whitted,
    #[default]
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    #[default]
    Independent,
    Stratified,
}

/// Reflectance model assigned to every loaded material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrdfModel {
    Diffuse,
    #[default]
    Phong,
    PhongEnergyConserving,
    LtcBeckmann,
}

impl BrdfModel {
    /// Bakes a BRDF instance for a material with the given Phong exponent.
    /// Beckmann roughness is derived from the exponent so glossier
    /// materials get tighter lobes.
    pub fn instantiate(&self, exponent: Float) -> crate::brdf::Brdf {
        use crate::brdf::Brdf;
        match self {
            BrdfModel::Diffuse => Brdf::Diffuse,
            BrdfModel::Phong => Brdf::Phong { exponent },
            BrdfModel::PhongEnergyConserving => Brdf::PhongEnergyConserving { exponent },
            BrdfModel::LtcBeckmann => Brdf::LtcBeckmann {
                roughness: (2.0 / (exponent.max(0.0) + 2.0)).sqrt().clamp(0.01, 1.0),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightTypeConfig {
    Point,
    Areal,
    FullSphere,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightConfig {
    #[serde(rename = "type")]
    pub kind: LightTypeConfig,
    pub pos: [Float; 3],
    #[serde(default = "default_light_normal")]
    pub normal: [Float; 3],
    #[serde(default)]
    pub size: Float,
    pub color: [Float; 3],
    pub intensity: Float,
}

impl LightConfig {
    pub fn to_light(&self) -> Light {
        Light {
            kind: match self.kind {
                LightTypeConfig::Point => LightKind::Point,
                LightTypeConfig::Areal => LightKind::Areal,
                LightTypeConfig::FullSphere => LightKind::FullSphere,
            },
            pos: Vec3::from_array(self.pos),
            normal: Vec3::from_array(self.normal).normalize(),
            size: self.size,
            color: Rgb::from_array(self.color),
            intensity: self.intensity,
        }
    }
}

/// Render job description, deserialized from a JSON file. Paths are
/// interpreted relative to the config file's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub model_file: Option<String>,
    pub output_file: String,
    pub xres: u32,
    pub yres: u32,
    pub view_point: [Float; 3],
    pub look_at: [Float; 3],
    #[serde(default = "default_up")]
    pub up_vector: [Float; 3],
    pub yview: Float,
    #[serde(default)]
    pub lights: Vec<LightConfig>,
    #[serde(default)]
    pub sky_color: [Float; 3],
    #[serde(default)]
    pub sky_texture: Option<String>,
    #[serde(default = "default_one_u32")]
    pub multisample: u32,
    #[serde(default = "default_one_u32")]
    pub recursion_level: u32,
    #[serde(default = "default_focus_plane")]
    pub focus_plane: Float,
    #[serde(default)]
    pub lens_size: Float,
    #[serde(default = "default_one_float")]
    pub bumpmap_scale: Float,
    #[serde(default = "default_clamp")]
    pub clamp: Float,
    /// Russian-roulette survival probability; negative disables roulette in
    /// favor of fixed-depth termination.
    #[serde(default = "default_russian")]
    pub russian: Float,
    /// Light-subpath length; zero disables the light subpath entirely.
    #[serde(default)]
    pub reverse: u32,
    #[serde(default)]
    pub force_fresnell: bool,
    #[serde(default)]
    pub tracer: TracerKind,
    #[serde(default)]
    pub sampler: SamplerKind,
    #[serde(default)]
    pub brdf: BrdfModel,
}

fn default_up() -> [Float; 3] {
    [0.0, 1.0, 0.0]
}

fn default_light_normal() -> [Float; 3] {
    [0.0, -1.0, 0.0]
}

fn default_one_u32() -> u32 {
    1
}

fn default_one_float() -> Float {
    1.0
}

fn default_focus_plane() -> Float {
    1.0
}

fn default_clamp() -> Float {
    Float::INFINITY
}

fn default_russian() -> Float {
    -1.0
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Config::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        let mut config: Config = serde_json::from_str(text)?;
        config.validate()?;
        // A recursion level of zero means "geometry only": direct lighting
        // is skipped entirely.
        if config.recursion_level == 0 {
            config.lights.clear();
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.xres == 0 || self.yres == 0 {
            return Err(ConfigError::Invalid(
                "xres and yres must be positive".to_string(),
            ));
        }
        if self.multisample == 0 {
            return Err(ConfigError::Invalid(
                "multisample must be at least 1".to_string(),
            ));
        }
        if self.yview <= 0.0 {
            return Err(ConfigError::Invalid("yview must be positive".to_string()));
        }
        if self.russian >= 1.0 {
            return Err(ConfigError::Invalid(
                "russian must stay below 1".to_string(),
            ));
        }
        if self.lens_size < 0.0 {
            return Err(ConfigError::Invalid(
                "lens_size must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Horizontal field of view, derived from the vertical one and the
    /// aspect ratio.
    pub fn xview(&self) -> Float {
        self.yview * self.xres as Float / self.yres as Float
    }

    pub fn lights(&self) -> Vec<Light> {
        self.lights.iter().map(LightConfig::to_light).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "output_file": "out.png",
        "xres": 64,
        "yres": 32,
        "view_point": [0, 1, 5],
        "look_at": [0, 0, 0],
        "yview": 1.2
    }"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = Config::from_json(MINIMAL).unwrap();
        assert_eq!(cfg.multisample, 1);
        assert_eq!(cfg.recursion_level, 1);
        assert_eq!(cfg.tracer, TracerKind::Path);
        assert_eq!(cfg.sampler, SamplerKind::Independent);
        assert!(cfg.lights.is_empty());
        assert!(cfg.model_file.is_none());
        assert_eq!(cfg.russian, -1.0);
        assert_eq!(cfg.clamp, Float::INFINITY);
        assert!((cfg.xview() - 2.4).abs() < 1e-5);
    }

    #[test]
    fn lights_parse_and_convert() {
        let text = r#"{
            "output_file": "out.png",
            "xres": 10, "yres": 10,
            "view_point": [0,0,0], "look_at": [0,0,-1], "yview": 1.0,
            "lights": [
                {"type": "point", "pos": [1,2,3], "color": [1,0,0], "intensity": 5.0},
                {"type": "areal", "pos": [0,4,0], "normal": [0,-1,0], "size": 0.5,
                 "color": [1,1,1], "intensity": 2.0}
            ]
        }"#;
        let cfg = Config::from_json(text).unwrap();
        let lights = cfg.lights();
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].kind, LightKind::Point);
        assert_eq!(lights[1].kind, LightKind::Areal);
        assert!((lights[1].size - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_recursion_clears_lights() {
        let text = r#"{
            "output_file": "out.png",
            "xres": 10, "yres": 10,
            "view_point": [0,0,0], "look_at": [0,0,-1], "yview": 1.0,
            "recursion_level": 0,
            "lights": [{"type": "point", "pos": [0,1,0], "color": [1,1,1], "intensity": 1.0}]
        }"#;
        let cfg = Config::from_json(text).unwrap();
        assert!(cfg.lights.is_empty());
    }

    #[test]
    fn rejects_malformed_and_invalid() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        let zero_res = MINIMAL.replace("\"xres\": 64", "\"xres\": 0");
        assert!(matches!(
            Config::from_json(&zero_res),
            Err(ConfigError::Invalid(_))
        ));
        let unknown = MINIMAL.replace("\"yview\": 1.2", "\"yview\": 1.2, \"bogus\": true");
        assert!(matches!(
            Config::from_json(&unknown),
            Err(ConfigError::Parse(_))
        ));
    }
}
