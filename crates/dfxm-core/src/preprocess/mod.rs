//! Stack preprocessing: background subtraction, threshold removal, and the
//! 3x3 median filter shared with map smoothing.

use rayon::prelude::*;

use crate::stack::ImageStack;

/// Below this many pixels the rayon overhead outweighs the parallelism.
const PARALLEL_THRESHOLD: usize = 64 * 64;

/// Subtract the per-pixel median across frames from every frame.
///
/// The median dark level of each detector pixel over the whole scan is taken
/// as its background; intensities are clamped at zero after subtraction.
pub fn subtract_median_background(stack: &mut ImageStack) {
    let pixels = stack.pixels();
    let frames = stack.frames;
    if frames == 0 || pixels == 0 {
        return;
    }

    let background = median_across_frames(&stack.data, frames, pixels);

    if pixels >= PARALLEL_THRESHOLD {
        stack.data.par_chunks_mut(pixels).for_each(|frame| {
            for (v, &bg) in frame.iter_mut().zip(background.iter()) {
                *v = (*v - bg).max(0.0);
            }
        });
    } else {
        for frame in stack.data.chunks_mut(pixels) {
            for (v, &bg) in frame.iter_mut().zip(background.iter()) {
                *v = (*v - bg).max(0.0);
            }
        }
    }
}

/// Per-pixel median over the frame axis. Even frame counts average the two
/// middle values, as numpy's median does.
fn median_across_frames(data: &[f32], frames: usize, pixels: usize) -> Vec<f32> {
    let median_of = |p: usize| {
        let mut column: Vec<f32> = (0..frames).map(|f| data[f * pixels + p]).collect();
        column.sort_by(f32::total_cmp);
        if frames % 2 == 1 {
            column[frames / 2]
        } else {
            0.5 * (column[frames / 2 - 1] + column[frames / 2])
        }
    };

    if pixels >= PARALLEL_THRESHOLD {
        (0..pixels).into_par_iter().map(median_of).collect()
    } else {
        (0..pixels).map(median_of).collect()
    }
}

/// Zero out intensities outside `[bottom, top]`.
pub fn remove_thresholds(stack: &mut ImageStack, bottom: Option<f32>, top: Option<f32>) {
    let lo = bottom.unwrap_or(f32::NEG_INFINITY);
    let hi = top.unwrap_or(f32::INFINITY);

    let clamp = |v: &mut f32| {
        if *v < lo || *v > hi {
            *v = 0.0;
        }
    };

    if stack.data.len() >= PARALLEL_THRESHOLD {
        stack.data.par_iter_mut().for_each(clamp);
    } else {
        stack.data.iter_mut().for_each(clamp);
    }
}

/// 3x3 median filter with zero-padded borders.
///
/// Matches scipy's `medfilt2d` with its default kernel: values outside the
/// image count as zeros, so border pixels are pulled toward zero.
pub fn median_filter_3x3(map: &[f64], height: usize, width: usize) -> Vec<f64> {
    debug_assert_eq!(map.len(), height * width);
    if height == 0 || width == 0 {
        return Vec::new();
    }

    let mut out = vec![0.0f64; height * width];
    let filter_row = |(y, row): (usize, &mut [f64])| {
        let mut window = [0.0f64; 9];
        for (x, out_v) in row.iter_mut().enumerate() {
            let mut n = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let ny = y as i64 + dy;
                    let nx = x as i64 + dx;
                    window[n] = if ny >= 0 && ny < height as i64 && nx >= 0 && nx < width as i64 {
                        map[ny as usize * width + nx as usize]
                    } else {
                        0.0
                    };
                    n += 1;
                }
            }
            window.sort_by(f64::total_cmp);
            *out_v = window[4];
        }
    };

    if map.len() >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(width).enumerate().for_each(filter_row);
    } else {
        out.chunks_mut(width).enumerate().for_each(filter_row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{ImageStack, ScanDimension};

    fn three_frame_stack() -> ImageStack {
        // One pixel, three frames: values 1, 5, 2 -> median 2
        ImageStack::new(
            3,
            1,
            1,
            vec![1.0, 5.0, 2.0],
            vec![ScanDimension::new("chi", vec![0.0, 1.0, 2.0])],
        )
        .unwrap()
    }

    // ========================================================================
    // Background subtraction
    // ========================================================================

    #[test]
    fn test_median_background_odd_frame_count() {
        let mut stack = three_frame_stack();
        subtract_median_background(&mut stack);

        // Median 2 subtracted, clamped at zero
        assert_eq!(stack.data, vec![0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_median_background_even_frame_count_averages() {
        let mut stack = ImageStack::new(
            4,
            1,
            1,
            vec![1.0, 2.0, 4.0, 8.0],
            vec![ScanDimension::new("chi", vec![0.0, 1.0, 2.0, 3.0])],
        )
        .unwrap();
        subtract_median_background(&mut stack);

        // Median of [1,2,4,8] is (2+4)/2 = 3
        assert_eq!(stack.data, vec![0.0, 0.0, 1.0, 5.0]);
    }

    #[test]
    fn test_background_is_per_pixel() {
        let mut stack = ImageStack::new(
            3,
            1,
            2,
            vec![1.0, 10.0, 5.0, 20.0, 2.0, 30.0],
            vec![ScanDimension::new("chi", vec![0.0, 1.0, 2.0])],
        )
        .unwrap();
        subtract_median_background(&mut stack);

        // Pixel 0: median 2; pixel 1: median 20
        assert_eq!(stack.data, vec![0.0, 0.0, 3.0, 0.0, 0.0, 10.0]);
    }

    // ========================================================================
    // Threshold removal
    // ========================================================================

    #[test]
    fn test_threshold_removal_zeroes_outside_range() {
        let mut stack = three_frame_stack();
        remove_thresholds(&mut stack, Some(1.5), Some(4.0));

        assert_eq!(stack.data, vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_threshold_removal_one_sided() {
        let mut stack = three_frame_stack();
        remove_thresholds(&mut stack, None, Some(4.0));
        assert_eq!(stack.data, vec![1.0, 0.0, 2.0]);

        let mut stack = three_frame_stack();
        remove_thresholds(&mut stack, Some(1.5), None);
        assert_eq!(stack.data, vec![0.0, 5.0, 2.0]);
    }

    // ========================================================================
    // Median filter
    // ========================================================================

    #[test]
    fn test_median_filter_removes_lone_spike() {
        let mut map = vec![1.0f64; 25];
        map[12] = 100.0;
        let filtered = median_filter_3x3(&map, 5, 5);

        assert_eq!(filtered[12], 1.0);
    }

    #[test]
    fn test_median_filter_zero_padding_at_corner() {
        let map = vec![1.0f64; 9];
        let filtered = median_filter_3x3(&map, 3, 3);

        // Corner window: four ones, five zeros -> median 0
        assert_eq!(filtered[0], 0.0);
        // Center window: all ones
        assert_eq!(filtered[4], 1.0);
    }

    #[test]
    fn test_median_filter_empty_map() {
        assert!(median_filter_3x3(&[], 0, 0).is_empty());
    }
}
