use std::{
    error::Error,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use glam::Vec3;
use log::info;

use lumen::{
    camera::Camera, color::Rgb, config::Config, mesh, render, scene::Scene, texture::Texture,
};

#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the render configuration file.
    config: Option<PathBuf>,

    /// Together with Y, enables verbose tracing of a single pixel.
    #[arg(value_name = "X")]
    debug_x: Option<u32>,

    #[arg(value_name = "Y")]
    debug_y: Option<u32>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let Some(config_path) = args.config else {
        println!("No input file, aborting.");
        return ExitCode::SUCCESS;
    };

    let debug_pixel = match (args.debug_x, args.debug_y) {
        (Some(x), Some(y)) => {
            println!("Debug mode enabled, will trace pixel {} {}", x, y);
            Some((x, y))
        }
        _ => None,
    };

    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config file: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let config_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let mut scene = match build_scene(&config, &config_dir) {
        Ok(scene) => scene,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    scene.commit();
    info!(
        "scene committed: {} triangles, {} materials, {} lights",
        scene.triangles.len(),
        scene.materials.len(),
        scene.lights.len()
    );

    let camera = Camera::new(
        Vec3::from_array(config.view_point),
        Vec3::from_array(config.look_at),
        Vec3::from_array(config.up_vector),
        config.yview,
        config.xview(),
        config.focus_plane,
        config.lens_size,
    );

    let output_path = config_dir.join(&config.output_file);
    let preview_path = preview_path_for(&output_path);
    let image = render::render(&scene, &camera, &config, &preview_path, debug_pixel);

    if let Err(err) = image.write(&output_path) {
        eprintln!("Failed to write output image: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn build_scene(config: &Config, config_dir: &Path) -> Result<Scene, Box<dyn Error>> {
    let mut scene = match &config.model_file {
        Some(model) => {
            let model_path = config_dir.join(model);
            Scene::from_mesh(mesh::load_obj(&model_path, config.brdf)?)
        }
        None => Scene::new(),
    };
    scene.lights = config.lights();
    scene.sky_color = Rgb::from_array(config.sky_color);
    if let Some(sky) = &config.sky_texture {
        let texture = Texture::load(&config_dir.join(sky))?;
        scene.textures.push(texture);
        scene.sky_texture = Some((scene.textures.len() - 1) as u32);
    }
    Ok(scene)
}

fn preview_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = output
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("png");
    output.with_file_name(format!("{}.preview.{}", stem, extension))
}
