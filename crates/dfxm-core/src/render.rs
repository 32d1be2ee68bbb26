//! Frame rendering: volume slices to 8-bit PNG files.
//!
//! Grayscale frames are normalized against the whole volume's finite range
//! so brightness is comparable across slices; NaN voxels render black.
//! Segmentation labels can be alpha-blended on top with a deterministic
//! palette.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::volume::Volume;

/// Blend weight of label colors over the grayscale frame.
const OVERLAY_ALPHA: f32 = 0.7;

/// Golden-angle hue step keeps adjacent labels visually distinct.
const GOLDEN_ANGLE: f32 = 137.508;

/// Render every slice of a volume to `out_dir` as `frame_NNNN.png`.
///
/// `labels`, when given, must have one entry per voxel; nonzero labels are
/// blended over the grayscale pixel. Returns the written paths in slice
/// order.
pub fn render_volume(
    volume: &Volume,
    labels: Option<&[u32]>,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, String> {
    if let Some(labels) = labels {
        if labels.len() != volume.data.len() {
            return Err(format!(
                "Label buffer has {} entries for {} voxels",
                labels.len(),
                volume.data.len()
            ));
        }
    }
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("Failed to create {}: {}", out_dir.display(), e))?;

    let stats = volume.stats();
    let slice_len = volume.slice_len();

    let mut paths = Vec::with_capacity(volume.depth);
    for z in 0..volume.depth {
        let gray = normalize_slice(volume.slice(z), stats.min, stats.max);
        let rgb = match labels {
            Some(labels) => overlay_labels(&gray, &labels[z * slice_len..(z + 1) * slice_len]),
            None => gray.iter().flat_map(|&g| [g, g, g]).collect(),
        };

        let path = out_dir.join(format!("frame_{:04}.png", z));
        write_png(&path, &rgb, volume.width, volume.height)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Normalize a slice to 0..255 using the volume-wide finite range.
fn normalize_slice(slice: &[f32], min: f32, max: f32) -> Vec<u8> {
    let range = max - min;
    slice
        .iter()
        .map(|&v| {
            if v.is_nan() || range <= 0.0 || !range.is_finite() {
                0
            } else {
                (255.0 * (v - min) / range).clamp(0.0, 255.0) as u8
            }
        })
        .collect()
}

/// Blend label colors over a grayscale frame.
fn overlay_labels(gray: &[u8], labels: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(gray.len() * 3);
    for (&g, &label) in gray.iter().zip(labels.iter()) {
        if label == 0 {
            rgb.extend_from_slice(&[g, g, g]);
        } else {
            let color = label_color(label);
            for c in 0..3 {
                let blended =
                    OVERLAY_ALPHA * color[c] as f32 + (1.0 - OVERLAY_ALPHA) * g as f32;
                rgb.push(blended.clamp(0.0, 255.0) as u8);
            }
        }
    }
    rgb
}

/// Deterministic RGB color for a label.
pub fn label_color(label: u32) -> [u8; 3] {
    let hue = (label as f32 * GOLDEN_ANGLE) % 360.0;
    hsv_to_rgb(hue, 0.8, 1.0)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

fn write_png(path: &Path, rgb: &[u8], width: usize, height: usize) -> Result<(), String> {
    let file =
        File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width as u32, height as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    writer
        .write_image_data(rgb)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_maps_range_to_full_scale() {
        let gray = normalize_slice(&[0.0, 5.0, 10.0], 0.0, 10.0);
        assert_eq!(gray, vec![0, 127, 255]);
    }

    #[test]
    fn test_normalize_nan_is_black() {
        let gray = normalize_slice(&[f32::NAN, 10.0], 0.0, 10.0);
        assert_eq!(gray, vec![0, 255]);
    }

    #[test]
    fn test_normalize_flat_volume() {
        let gray = normalize_slice(&[3.0, 3.0], 3.0, 3.0);
        assert_eq!(gray, vec![0, 0]);
    }

    #[test]
    fn test_label_colors_are_deterministic_and_distinct() {
        assert_eq!(label_color(1), label_color(1));
        assert_ne!(label_color(1), label_color(2));
        assert_ne!(label_color(2), label_color(3));
    }

    #[test]
    fn test_render_writes_one_png_per_slice() {
        let dir = tempfile::tempdir().unwrap();
        let volume = Volume::new(3, 2, 2, (0..12).map(|i| i as f32).collect()).unwrap();

        let paths = render_volume(&volume, None, dir.path()).unwrap();

        assert_eq!(paths.len(), 3);
        assert!(dir.path().join("frame_0000.png").exists());
        assert!(dir.path().join("frame_0002.png").exists());
    }

    #[test]
    fn test_render_with_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let volume = Volume::new(1, 2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let labels = vec![0, 1, 0, 2];

        let paths = render_volume(&volume, Some(&labels), dir.path()).unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_render_rejects_mismatched_labels() {
        let dir = tempfile::tempdir().unwrap();
        let volume = Volume::new(1, 2, 2, vec![0.0; 4]).unwrap();

        assert!(render_volume(&volume, Some(&[0, 1]), dir.path()).is_err());
    }
}
