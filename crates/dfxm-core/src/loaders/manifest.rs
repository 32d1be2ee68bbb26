//! `scan.yml` manifest: scan dimension names and positions for a dataset.

use std::path::Path;

use serde::Deserialize;

use crate::stack::ScanDimension;

/// Parsed `scan.yml` manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanManifest {
    /// Dataset name; defaults to the directory name when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Scan dimensions, first dimension slowest in a grid scan
    pub dimensions: Vec<DimensionSpec>,
}

/// One scan dimension in the manifest: either explicit per-step positions or
/// a `start`/`stop`/`count` linspace.
#[derive(Debug, Clone, Deserialize)]
pub struct DimensionSpec {
    pub name: String,

    #[serde(default)]
    pub positions: Option<Vec<f64>>,

    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub stop: Option<f64>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl ScanManifest {
    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let manifest: ScanManifest = serde_yaml::from_str(&text)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
        if manifest.dimensions.is_empty() {
            return Err(format!("{}: no scan dimensions defined", path.display()));
        }
        Ok(manifest)
    }

    /// Expand the manifest into per-frame position vectors for `frames`
    /// frames.
    ///
    /// A single dimension must cover every frame directly. A grid scan over
    /// several dimensions must have axis lengths whose product equals the
    /// frame count; positions are then tiled with the first dimension
    /// stepping slowest.
    pub fn expand(&self, frames: usize) -> Result<Vec<ScanDimension>, String> {
        let axes: Vec<Vec<f64>> = self
            .dimensions
            .iter()
            .map(|d| d.axis_values())
            .collect::<Result<_, _>>()?;

        let product: usize = axes.iter().map(|a| a.len()).product();
        if product != frames {
            let shape: Vec<String> = axes.iter().map(|a| a.len().to_string()).collect();
            return Err(format!(
                "Scan grid {} covers {} frames but the dataset has {}",
                shape.join("x"),
                product,
                frames
            ));
        }

        let mut dims = Vec::with_capacity(axes.len());
        // repeat = frames per step of this dimension (later dimensions vary faster)
        let mut repeat = frames;
        for (spec, axis) in self.dimensions.iter().zip(axes.iter()) {
            repeat /= axis.len();
            let positions = (0..frames)
                .map(|f| axis[(f / repeat) % axis.len()])
                .collect();
            dims.push(ScanDimension::new(spec.name.clone(), positions));
        }
        Ok(dims)
    }
}

impl DimensionSpec {
    /// The unique position values along this dimension's axis.
    pub fn axis_values(&self) -> Result<Vec<f64>, String> {
        match (&self.positions, self.start, self.stop, self.count) {
            (Some(positions), None, None, None) => {
                if positions.is_empty() {
                    Err(format!("Dimension '{}' has an empty position list", self.name))
                } else {
                    Ok(positions.clone())
                }
            }
            (None, Some(start), Some(stop), Some(count)) => {
                if count == 0 {
                    Err(format!("Dimension '{}' has count 0", self.name))
                } else {
                    Ok(linspace(start, stop, count))
                }
            }
            _ => Err(format!(
                "Dimension '{}' must give either 'positions' or 'start'/'stop'/'count'",
                self.name
            )),
        }
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    let step = (stop - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ScanManifest {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(-0.5, 0.5, 11);
        assert_eq!(v.len(), 11);
        assert!((v[0] + 0.5).abs() < 1e-12);
        assert!((v[10] - 0.5).abs() < 1e-12);
        assert!((v[5]).abs() < 1e-12);
    }

    #[test]
    fn test_linspace_single_point() {
        assert_eq!(linspace(2.0, 9.0, 1), vec![2.0]);
    }

    #[test]
    fn test_single_dimension_explicit_positions() {
        let manifest = parse(
            "dimensions:\n  - name: chi\n    positions: [0.0, 0.1, 0.2]\n",
        );
        let dims = manifest.expand(3).unwrap();

        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0].name, "chi");
        assert_eq!(dims[0].positions, vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn test_single_dimension_linspace() {
        let manifest = parse(
            "dimensions:\n  - name: diffry\n    start: 0.0\n    stop: 1.0\n    count: 5\n",
        );
        let dims = manifest.expand(5).unwrap();

        assert_eq!(dims[0].positions, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_grid_scan_tiles_first_dimension_slowest() {
        let manifest = parse(
            "dimensions:\n  - name: chi\n    positions: [10.0, 20.0]\n  - name: diffry\n    positions: [1.0, 2.0, 3.0]\n",
        );
        let dims = manifest.expand(6).unwrap();

        assert_eq!(dims[0].positions, vec![10.0, 10.0, 10.0, 20.0, 20.0, 20.0]);
        assert_eq!(dims[1].positions, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_grid_size_mismatch_is_error() {
        let manifest = parse(
            "dimensions:\n  - name: chi\n    positions: [10.0, 20.0]\n  - name: diffry\n    positions: [1.0, 2.0, 3.0]\n",
        );
        let err = manifest.expand(7).unwrap_err();
        assert!(err.contains("2x3"));
    }

    #[test]
    fn test_dimension_needs_positions_or_linspace() {
        let manifest = parse("dimensions:\n  - name: chi\n");
        assert!(manifest.expand(3).is_err());
    }

    #[test]
    fn test_dimension_rejects_mixed_spec() {
        let manifest = parse(
            "dimensions:\n  - name: chi\n    positions: [1.0]\n    start: 0.0\n    stop: 1.0\n    count: 1\n",
        );
        assert!(manifest.expand(1).is_err());
    }
}
