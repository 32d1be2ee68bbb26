//! 3D connected-component labeling via union-find.

use super::Connectivity;

/// Disjoint-set forest with path halving and union by size.
struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra as usize] < self.size[rb as usize] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb as usize] = ra;
        self.size[ra as usize] += self.size[rb as usize];
    }
}

/// Label connected components of a 3D binary mask.
///
/// Returns per-voxel labels (0 is background, components are dense from 1)
/// and the component count.
pub fn label_components(
    mask: &[bool],
    depth: usize,
    height: usize,
    width: usize,
    connectivity: Connectivity,
) -> (Vec<u32>, usize) {
    debug_assert_eq!(mask.len(), depth * height * width);

    let offsets = prior_offsets(connectivity);
    let mut forest = UnionFind::new(mask.len());

    let slice = height * width;
    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                let idx = z * slice + y * width + x;
                if !mask[idx] {
                    continue;
                }
                for &(dz, dy, dx) in &offsets {
                    let nz = z as i64 + dz;
                    let ny = y as i64 + dy;
                    let nx = x as i64 + dx;
                    if nz < 0
                        || ny < 0
                        || nx < 0
                        || ny >= height as i64
                        || nx >= width as i64
                    {
                        continue;
                    }
                    let nidx = nz as usize * slice + ny as usize * width + nx as usize;
                    if mask[nidx] {
                        forest.union(idx as u32, nidx as u32);
                    }
                }
            }
        }
    }

    // Second pass: dense labels in scan order of component roots
    let mut labels = vec![0u32; mask.len()];
    let mut root_label = std::collections::HashMap::new();
    let mut next = 1u32;
    for idx in 0..mask.len() {
        if !mask[idx] {
            continue;
        }
        let root = forest.find(idx as u32);
        let label = *root_label.entry(root).or_insert_with(|| {
            let l = next;
            next += 1;
            l
        });
        labels[idx] = label;
    }

    (labels, (next - 1) as usize)
}

/// Neighbor offsets that precede the current voxel in scan order, so each
/// adjacency is visited exactly once.
fn prior_offsets(connectivity: Connectivity) -> Vec<(i64, i64, i64)> {
    connectivity
        .offsets()
        .into_iter()
        .filter(|&(dz, dy, dx)| dz < 0 || (dz == 0 && (dy < 0 || (dy == 0 && dx < 0))))
        .collect()
}

/// Voxel count per label; index 0 is the background count.
pub fn component_sizes(labels: &[u32], count: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; count + 1];
    for &label in labels {
        sizes[label as usize] += 1;
    }
    sizes
}

/// Zero out every label except the `n` largest components (by voxel count,
/// background excluded). Surviving labels keep their values.
pub fn keep_largest(labels: &mut [u32], count: usize, n: usize) {
    if count <= n {
        return;
    }
    let sizes = component_sizes(labels, count);

    let mut ranked: Vec<u32> = (1..=count as u32).collect();
    ranked.sort_by(|&a, &b| sizes[b as usize].cmp(&sizes[a as usize]).then(a.cmp(&b)));
    let mut kept = vec![false; count + 1];
    for &label in ranked.iter().take(n) {
        kept[label as usize] = true;
    }

    for label in labels.iter_mut() {
        if !kept[*label as usize] {
            *label = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_separate_blobs() {
        // 1x1x5 line: XX.XX
        let mask = [true, true, false, true, true];
        let (labels, count) = label_components(&mask, 1, 1, 5, Connectivity::Six);

        assert_eq!(count, 2);
        assert_eq!(labels, vec![1, 1, 0, 2, 2]);
    }

    #[test]
    fn test_diagonal_touch_depends_on_connectivity() {
        // 1x2x2 plane with a diagonal pair
        let mask = [true, false, false, true];

        let (_, count6) = label_components(&mask, 1, 2, 2, Connectivity::Six);
        assert_eq!(count6, 2);

        let (labels18, count18) = label_components(&mask, 1, 2, 2, Connectivity::Eighteen);
        assert_eq!(count18, 1);
        assert_eq!(labels18, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_space_diagonal_needs_26() {
        // 2x2x2 cube with the two ends of a space diagonal set
        let mut mask = [false; 8];
        mask[0] = true;
        mask[7] = true;

        let (_, count18) = label_components(&mask, 2, 2, 2, Connectivity::Eighteen);
        assert_eq!(count18, 2);

        let (_, count26) = label_components(&mask, 2, 2, 2, Connectivity::TwentySix);
        assert_eq!(count26, 1);
    }

    #[test]
    fn test_components_connect_across_slices() {
        // 2x1x2: voxel (0,0,0) and (1,0,0) share a face
        let mask = [true, false, true, false];
        let (labels, count) = label_components(&mask, 2, 1, 2, Connectivity::Six);

        assert_eq!(count, 1);
        assert_eq!(labels, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_keep_largest_zeroes_small_components() {
        // Sizes: label 1 -> 2 voxels, label 2 -> 3 voxels, label 3 -> 1 voxel
        let mut labels = vec![1, 1, 2, 2, 2, 3, 0];
        keep_largest(&mut labels, 3, 2);

        assert_eq!(labels, vec![1, 1, 2, 2, 2, 0, 0]);
    }

    #[test]
    fn test_keep_largest_noop_when_enough_room() {
        let mut labels = vec![1, 2, 0];
        keep_largest(&mut labels, 2, 5);
        assert_eq!(labels, vec![1, 2, 0]);
    }
}
