//! Binary morphology on 3D masks with a ball structuring element.
//!
//! Out-of-bounds voxels count as background, so erosion eats into the
//! volume borders the way scipy's default `border_value=0` does.

/// Offsets of a ball structuring element: every voxel within `radius` of the
/// origin (euclidean, inclusive).
pub fn ball_offsets(radius: usize) -> Vec<(i64, i64, i64)> {
    let r = radius as i64;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                if dz * dz + dy * dy + dx * dx <= r2 {
                    offsets.push((dz, dy, dx));
                }
            }
        }
    }
    offsets
}

fn transform(
    mask: &[bool],
    depth: usize,
    height: usize,
    width: usize,
    offsets: &[(i64, i64, i64)],
    erode: bool,
) -> Vec<bool> {
    let slice = height * width;
    let mut out = vec![false; mask.len()];

    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                let idx = z * slice + y * width + x;
                let mut all = true;
                let mut any = false;
                for &(dz, dy, dx) in offsets {
                    let nz = z as i64 + dz;
                    let ny = y as i64 + dy;
                    let nx = x as i64 + dx;
                    let inside = nz >= 0
                        && ny >= 0
                        && nx >= 0
                        && nz < depth as i64
                        && ny < height as i64
                        && nx < width as i64;
                    let v = inside && mask[nz as usize * slice + ny as usize * width + nx as usize];
                    all &= v;
                    any |= v;
                }
                out[idx] = if erode { all } else { any };
            }
        }
    }
    out
}

/// Dilation: a voxel is set when any ball neighbor is set.
pub fn dilate(
    mask: &[bool],
    depth: usize,
    height: usize,
    width: usize,
    offsets: &[(i64, i64, i64)],
) -> Vec<bool> {
    transform(mask, depth, height, width, offsets, false)
}

/// Erosion: a voxel survives when the whole ball around it is set.
pub fn erode(
    mask: &[bool],
    depth: usize,
    height: usize,
    width: usize,
    offsets: &[(i64, i64, i64)],
) -> Vec<bool> {
    transform(mask, depth, height, width, offsets, true)
}

/// Binary closing: dilation followed by erosion.
pub fn close(
    mask: &[bool],
    depth: usize,
    height: usize,
    width: usize,
    radius: usize,
) -> Vec<bool> {
    if radius == 0 {
        return mask.to_vec();
    }
    let offsets = ball_offsets(radius);
    let dilated = dilate(mask, depth, height, width, &offsets);
    erode(&dilated, depth, height, width, &offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_radius_one_is_cross() {
        let offsets = ball_offsets(1);
        // Origin plus the six face neighbors
        assert_eq!(offsets.len(), 7);
        assert!(offsets.contains(&(0, 0, 0)));
        assert!(offsets.contains(&(1, 0, 0)));
        assert!(!offsets.contains(&(1, 1, 0)));
    }

    #[test]
    fn test_closing_fills_one_voxel_gap() {
        // 1x1x7 line: XX.XX with padding so erosion has room
        let mut mask = [false; 7];
        for i in [1, 2, 4, 5] {
            mask[i] = true;
        }
        let closed = close(&mask, 1, 1, 7, 1);

        assert!(closed[3], "closing should bridge the gap");
        assert!(closed[2] && closed[4], "original voxels survive");
    }

    #[test]
    fn test_closing_radius_zero_is_identity() {
        let mask = [true, false, true];
        assert_eq!(close(&mask, 1, 1, 3, 0), mask.to_vec());
    }

    #[test]
    fn test_erosion_removes_isolated_voxel() {
        let mut mask = [false; 27];
        mask[13] = true; // center of 3x3x3
        let eroded = erode(&mask, 3, 3, 3, &ball_offsets(1));

        assert!(eroded.iter().all(|&v| !v));
    }
}
