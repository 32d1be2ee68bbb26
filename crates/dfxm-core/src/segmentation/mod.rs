//! Volume segmentation: intensity binning, connected components, and
//! component postprocessing.
//!
//! The pipeline mirrors how grain volumes are carved out of moment maps:
//! bin the voxel intensities, label connected components inside each bin,
//! keep the largest ones, and smooth them with a binary closing.

mod components;
mod morphology;

pub use components::{component_sizes, keep_largest, label_components};
pub use morphology::{ball_offsets, close, dilate, erode};

use crate::loaders::linspace;
use crate::volume::Volume;

/// Neighbor connectivity for 3D component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Face neighbors only
    Six,
    /// Face and edge neighbors
    Eighteen,
    /// Face, edge and corner neighbors
    TwentySix,
}

impl Connectivity {
    /// Parse the conventional 6/18/26 notation.
    pub fn from_neighbors(n: usize) -> Result<Self, String> {
        match n {
            6 => Ok(Connectivity::Six),
            18 => Ok(Connectivity::Eighteen),
            26 => Ok(Connectivity::TwentySix),
            other => Err(format!(
                "Invalid connectivity {} (expected 6, 18 or 26)",
                other
            )),
        }
    }

    /// All neighbor offsets of this connectivity.
    pub fn offsets(&self) -> Vec<(i64, i64, i64)> {
        let max_nonzero = match self {
            Connectivity::Six => 1,
            Connectivity::Eighteen => 2,
            Connectivity::TwentySix => 3,
        };
        let mut offsets = Vec::new();
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nonzero = (dz != 0) as usize + (dy != 0) as usize + (dx != 0) as usize;
                    if nonzero > 0 && nonzero <= max_nonzero {
                        offsets.push((dz, dy, dx));
                    }
                }
            }
        }
        offsets
    }
}

/// Parameters for [`segment_volume`].
#[derive(Debug, Clone, Copy)]
pub struct SegmentationOptions {
    /// Number of intensity bins
    pub bins: usize,

    /// Largest components kept per bin
    pub components: usize,

    /// Ball radius of the binary closing
    pub closing_radius: usize,

    pub connectivity: Connectivity,
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        Self {
            bins: 5,
            components: 5,
            closing_radius: 2,
            connectivity: Connectivity::TwentySix,
        }
    }
}

/// Segmentation result for one intensity bin.
#[derive(Debug, Clone)]
pub struct BinSegmentation {
    /// Bin index, lowest intensities first
    pub bin: usize,

    /// Intensity range `lower <= v < upper` selecting this bin
    pub lower: f32,
    pub upper: f32,

    /// Per-voxel labels after postprocessing (0 is background)
    pub labels: Vec<u32>,

    /// Component count before the largest-N cut
    pub component_count: usize,
}

/// One binary mask per intensity bin.
///
/// Edges are `bins + 1` evenly spaced values over the finite min..max; bin
/// `i` selects `edge[i] <= v < edge[i+1]`, so the maximum voxel falls in no
/// bin and NaN voxels fall in none either.
pub fn intensity_bin_masks(volume: &Volume, bins: usize) -> Result<Vec<(f32, f32, Vec<bool>)>, String> {
    if bins == 0 {
        return Err("Segmentation needs at least one intensity bin".to_string());
    }
    let stats = volume.stats();
    if stats.min.is_nan() {
        return Err("Volume has no finite voxels to bin".to_string());
    }

    let edges = linspace(stats.min as f64, stats.max as f64, bins + 1);
    let masks = (0..bins)
        .map(|i| {
            let (lo, hi) = (edges[i] as f32, edges[i + 1] as f32);
            let mask = volume.data.iter().map(|&v| v >= lo && v < hi).collect();
            (lo, hi, mask)
        })
        .collect();
    Ok(masks)
}

/// Segment a volume into labeled components per intensity bin.
///
/// Per bin: label connected components, keep the largest N, close the kept
/// mask twice with a ball kernel, and mask the labels with the closed
/// volume.
pub fn segment_volume(
    volume: &Volume,
    options: &SegmentationOptions,
) -> Result<Vec<BinSegmentation>, String> {
    let (d, h, w) = (volume.depth, volume.height, volume.width);

    intensity_bin_masks(volume, options.bins)?
        .into_iter()
        .enumerate()
        .map(|(bin, (lower, upper, mask))| {
            let (mut labels, component_count) =
                label_components(&mask, d, h, w, options.connectivity);
            keep_largest(&mut labels, component_count, options.components);

            let kept: Vec<bool> = labels.iter().map(|&l| l > 0).collect();
            let closed = close(&kept, d, h, w, options.closing_radius);
            let closed = close(&closed, d, h, w, options.closing_radius);
            for (label, &keep) in labels.iter_mut().zip(closed.iter()) {
                if !keep {
                    *label = 0;
                }
            }

            Ok(BinSegmentation {
                bin,
                lower,
                upper,
                labels,
                component_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_offset_counts() {
        assert_eq!(Connectivity::Six.offsets().len(), 6);
        assert_eq!(Connectivity::Eighteen.offsets().len(), 18);
        assert_eq!(Connectivity::TwentySix.offsets().len(), 26);
    }

    #[test]
    fn test_connectivity_parsing() {
        assert_eq!(Connectivity::from_neighbors(6).unwrap(), Connectivity::Six);
        assert!(Connectivity::from_neighbors(8).is_err());
    }

    #[test]
    fn test_bin_masks_are_half_open() {
        let volume = Volume::new(1, 1, 4, vec![0.0, 1.0, 2.0, 4.0]).unwrap();
        let masks = intensity_bin_masks(&volume, 2).unwrap();

        assert_eq!(masks.len(), 2);
        // Edges 0, 2, 4: first bin [0, 2), second [2, 4)
        assert_eq!(masks[0].2, vec![true, true, false, false]);
        // The maximum voxel falls in no bin
        assert_eq!(masks[1].2, vec![false, false, true, false]);
    }

    #[test]
    fn test_bin_masks_skip_nan() {
        let volume = Volume::new(1, 1, 3, vec![0.0, f32::NAN, 1.0]).unwrap();
        let masks = intensity_bin_masks(&volume, 1).unwrap();

        assert_eq!(masks[0].2, vec![true, false, false]);
    }

    #[test]
    fn test_bin_masks_all_nan_is_error() {
        let volume = Volume::new(1, 1, 2, vec![f32::NAN; 2]).unwrap();
        assert!(intensity_bin_masks(&volume, 2).is_err());
    }

    #[test]
    fn test_segment_volume_keeps_largest_component() {
        // 1x1x9 line in one bin: a 3-voxel blob, a gap, a 1-voxel blob
        let mut data = vec![10.0f32; 9];
        for i in [3, 4, 6, 7, 8] {
            data[i] = 0.0;
        }
        data[5] = 10.0;
        // values: 10 10 10 0 0 10 0 0 0  -> plus a max sentinel so the 10s bin
        data[8] = 20.0;
        let volume = Volume::new(1, 1, 9, data).unwrap();

        let options = SegmentationOptions {
            bins: 2,
            components: 1,
            closing_radius: 0,
            connectivity: Connectivity::Six,
        };
        let result = segment_volume(&volume, &options).unwrap();

        // Second bin holds the 10s; components {0,1,2} and {5}
        let tens = &result[1];
        assert_eq!(tens.component_count, 2);
        assert_eq!(&tens.labels[0..3], &[1, 1, 1]);
        assert_eq!(tens.labels[5], 0, "smaller component dropped");
    }

    #[test]
    fn test_segment_volume_closing_bridges_gap() {
        // Two 2-voxel blobs of the same component label after keep_largest=2,
        // one voxel apart; closing with radius 1 bridges them in the mask.
        let data = vec![0.0, 5.0, 5.0, 0.0, 5.0, 5.0, 0.0, 9.0];
        let volume = Volume::new(1, 1, 8, data).unwrap();

        let options = SegmentationOptions {
            bins: 2,
            components: 2,
            closing_radius: 1,
            connectivity: Connectivity::Six,
        };
        let result = segment_volume(&volume, &options).unwrap();
        let fives = &result[1];

        // Both blobs survive; the bridged voxel itself has no label
        assert_eq!(fives.component_count, 2);
        assert!(fives.labels[1] > 0 && fives.labels[4] > 0);
        assert_eq!(fives.labels[3], 0);
    }
}
