//! Turns an unorganized scanning-LiDAR point set into a pixel-addressable grid.
//!
//! Points are projected through a pinhole intrinsic (camera-frame points, no
//! distortion). The grid is sized `(2·cy) × (2·cx)` so the principal point
//! sits at its center. With filtering enabled the sparse depth image is
//! densified by a floor-median window before being back-projected.

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::tensor::Tensor;

/// Grid extent `(rows, cols)` implied by an intrinsic matrix
pub fn grid_extent(intrinsic: &Matrix3<f32>) -> (usize, usize) {
    let rows = (intrinsic[(1, 2)] * 2.0) as i64;
    let cols = (intrinsic[(0, 2)] * 2.0) as i64;
    (rows.max(0) as usize, cols.max(0) as usize)
}

/// Pinhole projection `(u, v)` of a camera-frame point
#[inline]
fn project(intrinsic: &Matrix3<f32>, p: &Vector3<f32>) -> (f32, f32) {
    let inv_z = if p.z != 0.0 { 1.0 / p.z } else { 1.0 };
    let x = p.x * inv_z;
    let y = p.y * inv_z;
    let u = intrinsic[(0, 0)] * x + intrinsic[(0, 1)] * y + intrinsic[(0, 2)];
    let v = intrinsic[(1, 1)] * y + intrinsic[(1, 2)];
    (u, v)
}

/// Project points and keep those landing inside `[0, cols) × [0, rows)`.
///
/// Returns `(row, col, point)` triples in input order; pixel indices are the
/// projected coordinates truncated toward zero.
fn visible_pixels<'a>(
    points: &'a [Vector3<f32>],
    intrinsic: &'a Matrix3<f32>,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (usize, usize, &'a Vector3<f32>)> + 'a {
    points.iter().filter_map(move |p| {
        let (u, v) = project(intrinsic, p);
        // NaN fails every comparison and is dropped here
        if u >= 0.0 && u < cols as f32 && v >= 0.0 && v < rows as f32 {
            Some((v as usize, u as usize, p))
        } else {
            None
        }
    })
}

/// Lower median of the strictly positive values in `window`.
///
/// Returns 0 when the window holds no positive value. Sorting uses a total
/// order so equal inputs always give the same output.
pub fn floor_median(window: &mut [f32]) -> f32 {
    let max = window.iter().copied().fold(0.0f32, f32::max);
    if window.is_empty() || max <= 0.0 {
        return 0.0;
    }
    window.sort_unstable_by(f32::total_cmp);
    let len = window.len();
    if len % 2 == 1 {
        window[len / 2]
    } else {
        window[len / 2 - 1]
    }
}

/// Floor-median filter over a single channel depth image.
///
/// Each output pixel is the [`floor_median`] of the positive depths in the
/// `kernel × kernel` window centered on it, clipped at the image border.
pub fn floor_median_filter(depth: &Tensor<f32>, kernel: usize) -> Tensor<f32> {
    let (rows, cols, _) = depth.dims();
    let half = kernel / 2;
    let mut filtered = Tensor::zeros(rows, cols, 1);
    let mut window = Vec::with_capacity(kernel * kernel);

    for i in 0..rows {
        let top = i.saturating_sub(half);
        let bottom = (i + half + 1).min(rows);
        for j in 0..cols {
            let left = j.saturating_sub(half);
            let right = (j + half + 1).min(cols);

            window.clear();
            for n in top..bottom {
                for m in left..right {
                    if let Some(d) = depth.get(n, m, 0) {
                        if d > 0.0 {
                            window.push(d);
                        }
                    }
                }
            }
            filtered.set(i, j, 0, floor_median(&mut window));
        }
    }
    filtered
}

/// Organize `points` into a `(rows, cols, 3)` X/Y/Z grid.
///
/// `filter_size == 0` scatters the points directly (later points overwrite
/// earlier ones on the same pixel). Otherwise depths are scattered, filtered
/// with [`floor_median_filter`] and back-projected wherever the filtered
/// depth is positive.
pub fn organize(points: &[Vector3<f32>], intrinsic: &Matrix3<f32>, filter_size: usize) -> Tensor<f32> {
    let (rows, cols) = grid_extent(intrinsic);
    let mut grid = Tensor::zeros(rows, cols, 3);

    if filter_size == 0 {
        let mut scattered = 0usize;
        for (row, col, p) in visible_pixels(points, intrinsic, rows, cols) {
            if let Some(px) = grid.pixel_mut(row, col) {
                px.copy_from_slice(p.as_slice());
                scattered += 1;
            }
        }
        debug!(points = points.len(), scattered, rows, cols, "Organized point cloud without filter");
        return grid;
    }

    let mut depth = Tensor::zeros(rows, cols, 1);
    for (row, col, p) in visible_pixels(points, intrinsic, rows, cols) {
        depth.set(row, col, 0, p.z);
    }
    let filtered = floor_median_filter(&depth, filter_size);

    let (fx, fy) = (intrinsic[(0, 0)], intrinsic[(1, 1)]);
    let (cx, cy) = (intrinsic[(0, 2)], intrinsic[(1, 2)]);
    let mut filled = 0usize;
    for i in 0..rows {
        for j in 0..cols {
            let z = filtered.get(i, j, 0).unwrap_or(0.0);
            if z > 0.0 {
                let x = (j as f32 - cx) * z / fx;
                let y = (i as f32 - cy) * z / fy;
                if let Some(px) = grid.pixel_mut(i, j) {
                    px.copy_from_slice(&[x, y, z]);
                    filled += 1;
                }
            }
        }
    }
    debug!(points = points.len(), filled, rows, cols, filter_size, "Organized point cloud");
    grid
}
