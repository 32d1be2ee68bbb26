//! Moment map export and import.
//!
//! A dataset's maps are written as one Gray32Float TIFF per (dimension,
//! moment kind) plus a `maps.yml` manifest tying them together. The manifest
//! is the handle later stages use: volume assembly and rendering take a list
//! of manifest paths and pull the map they need out of each.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

use crate::moments::{MomentKind, MomentMaps};

/// Manifest file name written next to the map TIFFs.
pub const MAPS_MANIFEST: &str = "maps.yml";

/// `maps.yml`: what was exported and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsManifest {
    /// Dataset name
    pub name: String,

    /// Map height in pixels
    pub height: usize,

    /// Map width in pixels
    pub width: usize,

    /// One entry per scan dimension
    pub dimensions: Vec<ManifestDimension>,
}

/// Map files of one scan dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDimension {
    /// Motor name
    pub name: String,

    /// Moment kind key -> TIFF file name, relative to the manifest
    pub maps: Vec<ManifestMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMap {
    pub kind: String,
    pub file: String,
}

impl MapsManifest {
    /// Read and parse a `maps.yml` file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_yaml::from_str(&text)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    /// File name of the map for (dimension, kind), if exported.
    pub fn map_file(&self, dimension: &str, kind: MomentKind) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == dimension)
            .and_then(|d| d.maps.iter().find(|m| m.kind == kind.key()))
            .map(|m| m.file.as_str())
    }
}

/// Export moment maps of one dataset.
///
/// Writes `<dimension>_<kind>.tif` files and the manifest into `out_dir`
/// (created if missing) and returns the manifest path.
pub fn export_maps(
    out_dir: &Path,
    name: &str,
    maps: &[MomentMaps],
) -> Result<PathBuf, String> {
    if maps.is_empty() {
        return Err("No moment maps to export".to_string());
    }
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("Failed to create {}: {}", out_dir.display(), e))?;

    let (height, width) = (maps[0].height, maps[0].width);
    let mut dimensions = Vec::with_capacity(maps.len());
    for map_set in maps {
        let mut entries = Vec::with_capacity(4);
        for kind in MomentKind::all() {
            let file_name = format!("{}_{}.tif", map_set.dimension, kind.key());
            write_map_tiff(&out_dir.join(&file_name), map_set.map(kind), height, width)?;
            entries.push(ManifestMap {
                kind: kind.key().to_string(),
                file: file_name,
            });
        }
        dimensions.push(ManifestDimension {
            name: map_set.dimension.clone(),
            maps: entries,
        });
    }

    let manifest = MapsManifest {
        name: name.to_string(),
        height,
        width,
        dimensions,
    };
    let manifest_path = out_dir.join(MAPS_MANIFEST);
    let yaml = serde_yaml::to_string(&manifest)
        .map_err(|e| format!("Failed to serialize manifest: {}", e))?;
    std::fs::write(&manifest_path, yaml)
        .map_err(|e| format!("Failed to write {}: {}", manifest_path.display(), e))?;

    Ok(manifest_path)
}

/// Load one exported map back as f32 pixels.
///
/// `manifest_path` points at a `maps.yml`; the map file is resolved relative
/// to it.
pub fn load_map(
    manifest_path: &Path,
    dimension: &str,
    kind: MomentKind,
) -> Result<(Vec<f32>, usize, usize), String> {
    let manifest = MapsManifest::from_file(manifest_path)?;
    let file_name = manifest.map_file(dimension, kind).ok_or_else(|| {
        format!(
            "{}: no '{}' map for dimension '{}'",
            manifest_path.display(),
            kind.key(),
            dimension
        )
    })?;

    let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(file_name);
    let (pixels, height, width) = read_map_tiff(&path)?;
    if (height, width) != (manifest.height, manifest.width) {
        return Err(format!(
            "{}: map is {}x{} but the manifest says {}x{}",
            path.display(),
            height,
            width,
            manifest.height,
            manifest.width
        ));
    }
    Ok((pixels, height, width))
}

fn write_map_tiff(path: &Path, map: &[f64], height: usize, width: usize) -> Result<(), String> {
    let file =
        File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

    // Maps are stored as f32; NaN pixels survive the round trip
    let data: Vec<f32> = map.iter().map(|&v| v as f32).collect();
    encoder
        .write_image::<colortype::Gray32Float>(width as u32, height as u32, &data)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

fn read_map_tiff(path: &Path) -> Result<(Vec<f32>, usize, usize), String> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;
    let (w, h) = decoder
        .dimensions()
        .map_err(|e| format!("Failed to read dimensions of {}: {}", path.display(), e))?;

    match decoder
        .read_image()
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?
    {
        DecodingResult::F32(v) => Ok((v, h as usize, w as usize)),
        _ => Err(format!(
            "{}: expected a Gray32Float map TIFF",
            path.display()
        )),
    }
}
