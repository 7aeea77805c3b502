use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use glam::{Vec2, Vec3};
use log::{info, warn};
use thiserror::Error;

use crate::{
    color::Rgb, config::BrdfModel, material::Material, texture::Texture, triangle::Triangle, Float,
};

/// Triangles below this area are dropped at load time.
const DEGENERATE_AREA: Float = 1e-12;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to find model file `{0}`")]
    NotFound(PathBuf),
    #[error("importer rejected `{path}`: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("failed to decode texture `{path}`: {source}")]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Everything a model file contributes to the scene.
pub struct MeshData {
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

/// Imports an OBJ file with its MTL materials and referenced textures.
/// Faces are triangulated, smooth vertex normals are generated when the
/// file carries none, per-vertex tangents are computed afterwards, missing
/// UVs default to the origin and degenerate triangles are dropped.
pub fn load_obj(path: &Path, brdf_model: BrdfModel) -> Result<MeshData, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let (models, material_result) =
        tobj::load_obj(path, &options).map_err(|source| LoadError::Import {
            path: path.to_path_buf(),
            source,
        })?;
    let obj_materials = match material_result {
        Ok(materials) => materials,
        Err(err) => {
            warn!("material library for {} not usable: {}", path.display(), err);
            Vec::new()
        }
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let mut textures: Vec<Texture> = Vec::new();
    let mut texture_cache: HashMap<String, u32> = HashMap::new();

    let mut materials = Vec::with_capacity(obj_materials.len().max(1));
    for m in &obj_materials {
        materials.push(convert_material(
            m,
            brdf_model,
            &base_dir,
            &mut textures,
            &mut texture_cache,
        )?);
    }
    if materials.is_empty() {
        materials.push(Material::default());
    }

    let mut triangles = Vec::new();
    let mut degenerate = 0usize;
    for model in &models {
        let mesh = &model.mesh;
        let vertex_count = mesh.positions.len() / 3;
        let positions: Vec<Vec3> = (0..vertex_count)
            .map(|i| {
                Vec3::new(
                    mesh.positions[3 * i],
                    mesh.positions[3 * i + 1],
                    mesh.positions[3 * i + 2],
                )
            })
            .collect();
        let normals: Vec<Vec3> = if mesh.normals.len() == mesh.positions.len() {
            (0..vertex_count)
                .map(|i| {
                    Vec3::new(
                        mesh.normals[3 * i],
                        mesh.normals[3 * i + 1],
                        mesh.normals[3 * i + 2],
                    )
                })
                .collect()
        } else {
            smooth_normals(&positions, &mesh.indices)
        };
        let uvs: Vec<Vec2> = if mesh.texcoords.len() == 2 * vertex_count {
            (0..vertex_count)
                .map(|i| Vec2::new(mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1]))
                .collect()
        } else {
            vec![Vec2::ZERO; vertex_count]
        };
        // Tangents come last; they need both normals and UVs in place.
        let tangents = vertex_tangents(&positions, &uvs, &mesh.indices);

        let material = mesh
            .material_id
            .map(|id| id.min(materials.len() - 1))
            .unwrap_or(0) as u32;

        for chunk in mesh.indices.chunks_exact(3) {
            let [i0, i1, i2] = [chunk[0] as usize, chunk[1] as usize, chunk[2] as usize];
            let triangle = Triangle {
                positions: [positions[i0], positions[i1], positions[i2]],
                normals: [normals[i0], normals[i1], normals[i2]],
                tangents: [tangents[i0], tangents[i1], tangents[i2]],
                uvs: [uvs[i0], uvs[i1], uvs[i2]],
                material,
            };
            if triangle.area() <= DEGENERATE_AREA {
                degenerate += 1;
                continue;
            }
            triangles.push(triangle);
        }
    }

    info!(
        "loaded {} triangles, {} materials, {} textures from {} ({} degenerate dropped)",
        triangles.len(),
        materials.len(),
        textures.len(),
        path.display(),
        degenerate
    );

    Ok(MeshData {
        triangles,
        materials,
        textures,
    })
}

fn convert_material(
    m: &tobj::Material,
    brdf_model: BrdfModel,
    base_dir: &Path,
    textures: &mut Vec<Texture>,
    cache: &mut HashMap<String, u32>,
) -> Result<Material, LoadError> {
    let exponent = m.shininess.unwrap_or(1.0);
    let translucency = (1.0 - m.dissolve.unwrap_or(1.0)).clamp(0.0, 1.0);
    let emission = parse_emission(m);

    let ambient_texture = match &m.ambient_texture {
        Some(name) => Some(texture_index(name, base_dir, textures, cache)?),
        None => None,
    };
    let diffuse_texture = match &m.diffuse_texture {
        Some(name) => Some(texture_index(name, base_dir, textures, cache)?),
        None => None,
    };
    let specular_texture = match &m.specular_texture {
        Some(name) => Some(texture_index(name, base_dir, textures, cache)?),
        None => None,
    };
    // MTL "map_bump" lands in the normal texture slot.
    let bump_texture = match &m.normal_texture {
        Some(name) => Some(texture_index(name, base_dir, textures, cache)?),
        None => None,
    };

    Ok(Material {
        name: m.name.clone(),
        ambient: m.ambient.map(Rgb::from_array).unwrap_or(Rgb::BLACK),
        diffuse: m.diffuse.map(Rgb::from_array).unwrap_or(Rgb::splat(0.7)),
        specular: m.specular.map(Rgb::from_array).unwrap_or(Rgb::BLACK),
        ambient_texture,
        diffuse_texture,
        specular_texture,
        bump_texture,
        exponent,
        refraction_index: m.optical_density.unwrap_or(1.0),
        translucency,
        emissive: !emission.is_black(),
        emission,
        thinglass: m.name.starts_with("thinglass"),
        brdf: brdf_model.instantiate(exponent),
    })
}

fn texture_index(
    name: &str,
    base_dir: &Path,
    textures: &mut Vec<Texture>,
    cache: &mut HashMap<String, u32>,
) -> Result<u32, LoadError> {
    if let Some(&index) = cache.get(name) {
        return Ok(index);
    }
    let path = base_dir.join(name);
    let texture = Texture::load(&path).map_err(|source| LoadError::Texture {
        path: path.clone(),
        source,
    })?;
    textures.push(texture);
    let index = (textures.len() - 1) as u32;
    cache.insert(name.to_string(), index);
    Ok(index)
}

fn parse_emission(m: &tobj::Material) -> Rgb {
    let Some(ke) = m.unknown_param.get("Ke") else {
        return Rgb::BLACK;
    };
    let values: Vec<Float> = ke
        .split_whitespace()
        .filter_map(|v| v.parse().ok())
        .collect();
    if values.len() == 3 {
        Rgb::new(values[0], values[1], values[2])
    } else {
        Rgb::BLACK
    }
}

/// Area-weighted smooth vertex normals for meshes that ship without any.
fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];
    for chunk in indices.chunks_exact(3) {
        let [i0, i1, i2] = [chunk[0] as usize, chunk[1] as usize, chunk[2] as usize];
        let face = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        accumulated[i0] += face;
        accumulated[i1] += face;
        accumulated[i2] += face;
    }
    accumulated
        .into_iter()
        .map(|n| {
            if n.length_squared() > 0.0 {
                n.normalize()
            } else {
                Vec3::Z
            }
        })
        .collect()
}

/// Per-vertex tangents from UV gradients, accumulated across shared
/// vertices. Vertices whose accumulated tangent cancels out keep a zero
/// tangent, which disables bump perturbation there.
fn vertex_tangents(positions: &[Vec3], uvs: &[Vec2], indices: &[u32]) -> Vec<Vec3> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];
    for chunk in indices.chunks_exact(3) {
        let [i0, i1, i2] = [chunk[0] as usize, chunk[1] as usize, chunk[2] as usize];
        let e1 = positions[i1] - positions[i0];
        let e2 = positions[i2] - positions[i0];
        let duv1 = uvs[i1] - uvs[i0];
        let duv2 = uvs[i2] - uvs[i0];
        let det = duv1.x * duv2.y - duv1.y * duv2.x;
        let tangent = if det.abs() < 1e-8 {
            e1
        } else {
            (e1 * duv2.y - e2 * duv1.y) / det
        };
        accumulated[i0] += tangent;
        accumulated[i1] += tangent;
        accumulated[i2] += tangent;
    }
    accumulated
        .into_iter()
        .map(|t| {
            if t.length_squared() > 0.0 {
                t.normalize()
            } else {
                Vec3::ZERO
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_obj(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}_{}.obj", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn quad_is_triangulated_with_generated_normals() {
        let path = write_temp_obj(
            "lumen_quad",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );
        let mesh = load_obj(&path, BrdfModel::Diffuse).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.materials.len(), 1);
        for tri in &mesh.triangles {
            for n in tri.normals {
                assert!(n.distance(Vec3::Z) < 1e-5);
            }
        }
    }

    #[test]
    fn degenerate_faces_are_dropped() {
        let path = write_temp_obj(
            "lumen_degenerate",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nf 1 1 2\n",
        );
        let mesh = load_obj(&path, BrdfModel::Diffuse).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(mesh.triangles.len(), 1);
    }

    #[test]
    fn missing_file_is_reported() {
        let missing = Path::new("/nonexistent/model.obj");
        assert!(matches!(
            load_obj(missing, BrdfModel::Diffuse),
            Err(LoadError::NotFound(_))
        ));
    }
}
