//! `organize` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use contracts::CamParameters;
use frames::codec::{npy, ply};
use frames::organizer;

use crate::cli::OrganizeArgs;

/// Execute the `organize` command
pub fn run_organize(args: &OrganizeArgs) -> Result<()> {
    let points = ply::read_points(&args.input)
        .with_context(|| format!("Failed to read point cloud {}", args.input.display()))?;
    let params = CamParameters::pinhole(args.fx, args.fy, args.cx, args.cy);

    let grid = organizer::organize(&points, &params.intrinsic, args.filter);
    let (rows, cols) = (grid.rows(), grid.cols());
    if rows == 0 || cols == 0 {
        anyhow::bail!(
            "Principal point ({}, {}) gives an empty grid",
            args.cx,
            args.cy
        );
    }

    npy::write(&args.out, &[rows, cols, 3], grid.as_slice())
        .with_context(|| format!("Failed to write grid {}", args.out.display()))?;

    let filled = grid.as_slice().chunks_exact(3).filter(|p| p[2] > 0.0).count();
    info!(
        points = points.len(),
        rows,
        cols,
        filled,
        out = %args.out.display(),
        "Point cloud organized"
    );
    println!(
        "✓ {} points -> {}x{} grid ({} pixels filled): {}",
        points.len(),
        rows,
        cols,
        filled,
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_organize_ply_to_npy() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cloud.ply");
        let out = dir.path().join("grid.npy");
        ply::write_points(
            &input,
            &[Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.05, 0.05, 1.0)],
        )
        .unwrap();

        run_organize(&OrganizeArgs {
            input,
            fx: 100.0,
            fy: 100.0,
            cx: 50.0,
            cy: 50.0,
            filter: 0,
            out: out.clone(),
        })
        .unwrap();

        let grid = npy::read::<f32>(&out).unwrap();
        assert_eq!(grid.shape, vec![100, 100, 3]);
        let at = |row: usize, col: usize| {
            let base = (row * 100 + col) * 3;
            grid.data[base..base + 3].to_vec()
        };
        assert_eq!(at(50, 50), vec![0.0, 0.0, 1.0]);
        assert_eq!(at(55, 55), vec![0.05, 0.05, 1.0]);
    }

    #[test]
    fn test_zero_principal_point_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cloud.ply");
        ply::write_points(&input, &[Vector3::new(0.0, 0.0, 1.0)]).unwrap();
        let result = run_organize(&OrganizeArgs {
            input,
            fx: 1.0,
            fy: 1.0,
            cx: 0.0,
            cy: 0.0,
            filter: 0,
            out: dir.path().join("grid.npy"),
        });
        assert!(result.is_err());
    }
}
