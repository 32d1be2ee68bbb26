//! Dataset loading: a directory of grayscale TIFF frames plus a `scan.yml`
//! manifest describing the scan dimensions.
//!
//! Frames are ordered lexicographically by file name, so zero-padded indices
//! sort correctly. u8 and u16 frames are widened to f32 without rescaling;
//! detector counts stay detector counts.

mod manifest;

pub use manifest::{linspace, DimensionSpec, ScanManifest};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};

use crate::stack::ImageStack;

/// Manifest file name expected inside a dataset directory.
pub const SCAN_MANIFEST: &str = "scan.yml";

/// Load a dataset directory into an [`ImageStack`].
pub fn load_dataset(dir: &Path) -> Result<ImageStack, String> {
    let manifest = ScanManifest::from_file(&dir.join(SCAN_MANIFEST))?;
    let frame_paths = frame_files(dir)?;
    if frame_paths.is_empty() {
        return Err(format!("No TIFF frames found in {}", dir.display()));
    }

    let mut data = Vec::new();
    let mut shape: Option<(usize, usize)> = None;
    for path in &frame_paths {
        let (w, h, pixels) = read_frame(path)?;
        match shape {
            None => shape = Some((w, h)),
            Some(expected) if expected != (w, h) => {
                return Err(format!(
                    "Frame {} is {}x{}, expected {}x{}",
                    path.display(),
                    w,
                    h,
                    expected.0,
                    expected.1
                ));
            }
            Some(_) => {}
        }
        data.extend_from_slice(&pixels);
    }

    let (width, height) = shape.unwrap_or((0, 0));
    let frames = frame_paths.len();
    let dimensions = manifest.expand(frames)?;

    ImageStack::new(frames, height, width, data, dimensions)
}

/// Dataset name for a directory: the manifest's `name` or the directory name.
pub fn dataset_name(dir: &Path) -> Result<String, String> {
    let manifest = ScanManifest::from_file(&dir.join(SCAN_MANIFEST))?;
    Ok(manifest.name.unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string())
    }))
}

/// TIFF files in `dir`, sorted lexicographically by file name.
fn frame_files(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("Failed to read directory {}: {}", dir.display(), e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "tif" | "tiff"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Decode one grayscale TIFF frame to f32.
fn read_frame(path: &Path) -> Result<(usize, usize, Vec<f32>), String> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;

    match decoder
        .colortype()
        .map_err(|e| format!("Failed to read color type of {}: {}", path.display(), e))?
    {
        tiff::ColorType::Gray(_) => {}
        other => {
            return Err(format!(
                "{}: unsupported color type {:?}, expected grayscale",
                path.display(),
                other
            ));
        }
    }

    let (w, h) = decoder
        .dimensions()
        .map_err(|e| format!("Failed to read dimensions of {}: {}", path.display(), e))?;

    let pixels = match decoder
        .read_image()
        .map_err(|e| format!("Failed to read image data of {}: {}", path.display(), e))?
    {
        DecodingResult::U8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        _ => {
            return Err(format!(
                "{}: unsupported TIFF sample format (expected u8, u16 or f32)",
                path.display()
            ));
        }
    };

    Ok((w as usize, h as usize, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tiff::encoder::{colortype, TiffEncoder};

    fn write_f32_frame(path: &Path, w: u32, h: u32, data: &[f32]) {
        let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(w, h, data)
            .unwrap();
    }

    fn write_u16_frame(path: &Path, w: u32, h: u32, data: &[u16]) {
        let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray16>(w, h, data)
            .unwrap();
    }

    fn write_manifest(dir: &Path, yaml: &str) {
        let mut file = File::create(dir.join(SCAN_MANIFEST)).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_f32_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_f32_frame(&dir.path().join("frame_000.tif"), 2, 2, &[1.0, 2.0, 3.0, 4.0]);
        write_f32_frame(&dir.path().join("frame_001.tif"), 2, 2, &[5.0, 6.0, 7.0, 8.0]);
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    positions: [0.0, 0.5]\n",
        );

        let stack = load_dataset(dir.path()).unwrap();

        assert_eq!(stack.frames, 2);
        assert_eq!((stack.height, stack.width), (2, 2));
        assert_eq!(stack.frame(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stack.frame(1), &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(stack.dimensions[0].positions, vec![0.0, 0.5]);
    }

    #[test]
    fn test_frames_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        // Written out of order; zero-padded names must sort them back
        write_f32_frame(&dir.path().join("frame_010.tif"), 1, 1, &[10.0]);
        write_f32_frame(&dir.path().join("frame_002.tif"), 1, 1, &[2.0]);
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    start: 0.0\n    stop: 1.0\n    count: 2\n",
        );

        let stack = load_dataset(dir.path()).unwrap();
        assert_eq!(stack.data, vec![2.0, 10.0]);
    }

    #[test]
    fn test_u16_frames_widen_without_rescaling() {
        let dir = tempfile::tempdir().unwrap();
        write_u16_frame(&dir.path().join("a.tiff"), 2, 1, &[0, 40000]);
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    positions: [0.0]\n",
        );

        let stack = load_dataset(dir.path()).unwrap();
        assert_eq!(stack.data, vec![0.0, 40000.0]);
    }

    #[test]
    fn test_mismatched_frame_shape_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_f32_frame(&dir.path().join("a.tif"), 2, 2, &[0.0; 4]);
        write_f32_frame(&dir.path().join("b.tif"), 3, 2, &[0.0; 6]);
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    positions: [0.0, 1.0]\n",
        );

        let err = load_dataset(dir.path()).unwrap_err();
        assert!(err.contains("expected 2x2"));
    }

    #[test]
    fn test_frame_count_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_f32_frame(&dir.path().join("a.tif"), 1, 1, &[0.0]);
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    positions: [0.0, 1.0]\n",
        );

        assert!(load_dataset(dir.path()).is_err());
    }

    #[test]
    fn test_missing_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_f32_frame(&dir.path().join("a.tif"), 1, 1, &[0.0]);

        let err = load_dataset(dir.path()).unwrap_err();
        assert!(err.contains("scan.yml"));
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    positions: [0.0]\n",
        );

        let err = load_dataset(dir.path()).unwrap_err();
        assert!(err.contains("No TIFF frames"));
    }

    #[test]
    fn test_dataset_name_falls_back_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "dimensions:\n  - name: chi\n    positions: [0.0]\n",
        );
        let name = dataset_name(dir.path()).unwrap();
        assert!(!name.is_empty());

        write_manifest(
            dir.path(),
            "name: sample_a\ndimensions:\n  - name: chi\n    positions: [0.0]\n",
        );
        assert_eq!(dataset_name(dir.path()).unwrap(), "sample_a");
    }
}
