//! In-memory representation of a DFXM image stack.
//!
//! A stack is a sequence of 2D detector frames acquired while one or more
//! goniometer motors step through scan positions. Frames are stored
//! frame-major as f32 so the whole stack is a single contiguous buffer.

/// One scan dimension: a motor name and its position for every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanDimension {
    /// Motor name, e.g. "chi" or "diffry"
    pub name: String,

    /// Scan position of this motor for each frame (len == frame count)
    pub positions: Vec<f64>,
}

impl ScanDimension {
    pub fn new(name: impl Into<String>, positions: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            positions,
        }
    }
}

/// A stack of detector frames with scan metadata.
#[derive(Debug, Clone)]
pub struct ImageStack {
    /// Number of frames along the scan axis
    pub frames: usize,

    /// Frame height in pixels
    pub height: usize,

    /// Frame width in pixels
    pub width: usize,

    /// Intensities, frame-major: `data[f * height * width + y * width + x]`
    pub data: Vec<f32>,

    /// Scan dimensions; every dimension carries one position per frame
    pub dimensions: Vec<ScanDimension>,
}

impl ImageStack {
    /// Build a stack, validating buffer and dimension lengths.
    pub fn new(
        frames: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
        dimensions: Vec<ScanDimension>,
    ) -> Result<Self, String> {
        let expected = frames * height * width;
        if data.len() != expected {
            return Err(format!(
                "Stack buffer size mismatch: expected {} ({}x{}x{}), got {}",
                expected,
                frames,
                height,
                width,
                data.len()
            ));
        }
        if dimensions.is_empty() {
            return Err("Stack must have at least one scan dimension".to_string());
        }
        for dim in &dimensions {
            if dim.positions.len() != frames {
                return Err(format!(
                    "Dimension '{}' has {} positions for {} frames",
                    dim.name,
                    dim.positions.len(),
                    frames
                ));
            }
        }
        Ok(Self {
            frames,
            height,
            width,
            data,
            dimensions,
        })
    }

    /// Number of pixels in one frame.
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }

    /// Borrow one frame as a flat pixel slice.
    pub fn frame(&self, index: usize) -> &[f32] {
        let pixels = self.pixels();
        &self.data[index * pixels..(index + 1) * pixels]
    }

    /// Mutable access to one frame.
    pub fn frame_mut(&mut self, index: usize) -> &mut [f32] {
        let pixels = self.pixels();
        &mut self.data[index * pixels..(index + 1) * pixels]
    }

    /// Look up a scan dimension by motor name.
    pub fn dimension(&self, name: &str) -> Option<&ScanDimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(frames: usize) -> Vec<ScanDimension> {
        vec![ScanDimension::new("chi", vec![0.0; frames])]
    }

    #[test]
    fn test_new_validates_buffer_size() {
        let result = ImageStack::new(2, 3, 3, vec![0.0; 17], dims(2));
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("size mismatch"));
    }

    #[test]
    fn test_new_requires_dimension() {
        let result = ImageStack::new(2, 2, 2, vec![0.0; 8], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_validates_position_count() {
        let bad = vec![ScanDimension::new("chi", vec![0.0; 3])];
        let result = ImageStack::new(2, 2, 2, vec![0.0; 8], bad);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("positions"));
    }

    #[test]
    fn test_frame_slicing() {
        let mut data = vec![0.0; 8];
        data[4..8].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let stack = ImageStack::new(2, 2, 2, data, dims(2)).unwrap();

        assert_eq!(stack.frame(0), &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(stack.frame(1), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_dimension_lookup() {
        let stack = ImageStack::new(1, 1, 1, vec![0.5], dims(1)).unwrap();
        assert!(stack.dimension("chi").is_some());
        assert!(stack.dimension("phi").is_none());
    }
}
