//! 3D volumes assembled from exported moment maps.
//!
//! Each exported dataset contributes one slice; stacking the same
//! (dimension, moment kind) map from an ordered list of manifests gives a
//! depth x height x width volume for segmentation and rendering.

use std::path::Path;

use crate::exporters::load_map;
use crate::moments::MomentKind;

/// A dense f32 volume, slice-major: `data[z * height * width + y * width + x]`.
#[derive(Debug, Clone)]
pub struct Volume {
    pub depth: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

/// NaN-aware summary statistics of a volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub nan_count: usize,
}

impl Volume {
    pub fn new(depth: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self, String> {
        let expected = depth * height * width;
        if data.len() != expected {
            return Err(format!(
                "Volume buffer size mismatch: expected {} ({}x{}x{}), got {}",
                expected,
                depth,
                height,
                width,
                data.len()
            ));
        }
        Ok(Self {
            depth,
            height,
            width,
            data,
        })
    }

    /// Voxels per slice.
    pub fn slice_len(&self) -> usize {
        self.height * self.width
    }

    /// Borrow one z-slice.
    pub fn slice(&self, z: usize) -> &[f32] {
        let len = self.slice_len();
        &self.data[z * len..(z + 1) * len]
    }

    /// Min, max and mean over finite voxels plus the NaN count.
    ///
    /// A volume with no finite voxel reports NaN for all three statistics.
    pub fn stats(&self) -> VolumeStats {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut finite = 0usize;
        let mut nan_count = 0usize;

        for &v in &self.data {
            if v.is_nan() {
                nan_count += 1;
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            finite += 1;
        }

        if finite == 0 {
            VolumeStats {
                min: f32::NAN,
                max: f32::NAN,
                mean: f32::NAN,
                nan_count,
            }
        } else {
            VolumeStats {
                min,
                max,
                mean: (sum / finite as f64) as f32,
                nan_count,
            }
        }
    }
}

/// Stack the same (dimension, kind) map from each manifest into a volume.
///
/// Slice order follows the manifest order; every slice must share the same
/// height and width.
pub fn assemble_volume<P: AsRef<Path>>(
    manifests: &[P],
    dimension: &str,
    kind: MomentKind,
) -> Result<Volume, String> {
    if manifests.is_empty() {
        return Err("No map manifests given".to_string());
    }

    let mut data = Vec::new();
    let mut shape: Option<(usize, usize)> = None;
    for manifest in manifests {
        let manifest = manifest.as_ref();
        let (pixels, h, w) = load_map(manifest, dimension, kind)?;
        match shape {
            None => shape = Some((h, w)),
            Some(expected) if expected != (h, w) => {
                return Err(format!(
                    "{}: slice is {}x{}, expected {}x{}",
                    manifest.display(),
                    h,
                    w,
                    expected.0,
                    expected.1
                ));
            }
            Some(_) => {}
        }
        data.extend_from_slice(&pixels);
    }

    let (height, width) = shape.unwrap_or((0, 0));
    Volume::new(manifests.len(), height, width, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporters::export_maps;
    use crate::moments::{MomentMaps, MomentPlanes};

    #[test]
    fn test_new_validates_buffer_size() {
        assert!(Volume::new(2, 2, 2, vec![0.0; 7]).is_err());
        assert!(Volume::new(2, 2, 2, vec![0.0; 8]).is_ok());
    }

    #[test]
    fn test_slice_access() {
        let volume = Volume::new(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(volume.slice(0), &[1.0, 2.0]);
        assert_eq!(volume.slice(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_stats_ignore_nan() {
        let volume = Volume::new(1, 2, 2, vec![1.0, f32::NAN, 3.0, 2.0]).unwrap();
        let stats = volume.stats();

        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.nan_count, 1);
    }

    #[test]
    fn test_stats_all_nan() {
        let volume = Volume::new(1, 1, 2, vec![f32::NAN, f32::NAN]).unwrap();
        let stats = volume.stats();

        assert!(stats.min.is_nan());
        assert!(stats.mean.is_nan());
        assert_eq!(stats.nan_count, 2);
    }

    fn export_one(dir: &Path, com_value: f64) -> std::path::PathBuf {
        let planes = MomentPlanes {
            com: vec![com_value; 4],
            fwhm: vec![0.0; 4],
            skewness: vec![0.0; 4],
            kurtosis: vec![0.0; 4],
        };
        let maps = vec![MomentMaps {
            dimension: "chi".to_string(),
            height: 2,
            width: 2,
            planes,
        }];
        export_maps(dir, "slice", &maps).unwrap()
    }

    #[test]
    fn test_assemble_volume_from_manifests() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let manifests = vec![export_one(a.path(), 1.0), export_one(b.path(), 2.0)];

        let volume = assemble_volume(&manifests, "chi", MomentKind::CenterOfMass).unwrap();

        assert_eq!(volume.depth, 2);
        assert_eq!(volume.slice(0), &[1.0; 4]);
        assert_eq!(volume.slice(1), &[2.0; 4]);
    }

    #[test]
    fn test_assemble_volume_empty_list_is_error() {
        let manifests: Vec<&Path> = Vec::new();
        assert!(assemble_volume(&manifests, "chi", MomentKind::Fwhm).is_err());
    }
}
