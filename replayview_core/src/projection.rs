//! Projection from vehicle coordinates into image and grid space.
//!
//! Two mappings live here:
//! - [`warp_points`]: homogeneous transform + perspective division through a
//!   calibration matrix (ground plane -> camera pixels)
//! - [`vehicle_to_grid`]: affine offset/scale onto the top-down grid
//!
//! Neither mapping guards against degenerate results. A zero denominator
//! yields non-finite coordinates, and callers drop those at their bounds
//! checks before touching a pixel.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::UiParams;
use crate::error::{ReplayError, Result};

/// Project a batch of points through a homogeneous calibration matrix.
///
/// # Arguments
/// * `points` - N x M batch, one point per row
/// * `warp` - K x (M+1) matrix; the last column is the translation
///
/// # Returns
/// N x (K-1) batch where every coordinate was divided by the last
/// row of the transformed point.
pub fn warp_points(points: &DMatrix<f64>, warp: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (num_points, dim) = points.shape();
    if num_points == 0 || dim == 0 {
        return Err(ReplayError::EmptyInput("point batch"));
    }
    if warp.ncols() != dim + 1 {
        return Err(ReplayError::dimension(format!(
            "calibration has {} columns but points have {} coordinates (expected {})",
            warp.ncols(),
            dim,
            dim + 1
        )));
    }
    if warp.nrows() < 2 {
        return Err(ReplayError::dimension(format!(
            "calibration needs at least 2 rows for perspective division, got {}",
            warp.nrows()
        )));
    }

    // K x N: linear part applied to every point, then translated
    let mut projected = warp.columns(0, dim) * points.transpose();
    let translation = warp.column(dim);
    for mut col in projected.column_iter_mut() {
        col += &translation;
    }

    let last = warp.nrows() - 1;
    Ok(DMatrix::from_fn(num_points, last, |i, j| {
        projected[(j, i)] / projected[(last, i)]
    }))
}

/// Project a single point. Convenience wrapper around [`warp_points`].
pub fn warp_point(point: &[f64], warp: &DMatrix<f64>) -> Result<Vec<f64>> {
    let batch = DMatrix::from_row_slice(1, point.len(), point);
    let projected = warp_points(&batch, warp)?;
    Ok(projected.row(0).iter().copied().collect())
}

/// Integer cell on the top-down grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    pub x: usize,
    pub y: usize,
}

/// Map a vehicle-relative position onto the top-down grid.
///
/// Lateral offset grows to the left and longitudinal distance grows
/// forward, so both axes are flipped before the car origin is added.
/// Returns `None` when the cell falls outside the grid (non-finite
/// input included).
pub fn vehicle_to_grid(params: &UiParams, lateral: f64, longitudinal: f64) -> Option<GridPoint> {
    let px = -lateral * params.lidar_zoom + params.lidar_car_x;
    let py = -longitudinal * params.lidar_zoom + params.lidar_car_y;
    let on_grid =
        px >= 0.0 && py >= 0.0 && px < params.lidar_x as f64 && py < params.lidar_y as f64;
    if on_grid {
        Some(GridPoint {
            x: px as usize,
            y: py as usize,
        })
    } else {
        None
    }
}

/// The two named transforms a replay frame is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    car_to_model: DMatrix<f64>,
    car_to_bb: DMatrix<f64>,
}

/// On-disk calibration: row-major 3x3 matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub car_to_model: [[f64; 3]; 3],
    pub car_to_bb: [[f64; 3]; 3],
}

impl Calibration {
    /// Build a calibration for 2D ground-plane points.
    pub fn new(car_to_model: DMatrix<f64>, car_to_bb: DMatrix<f64>) -> Result<Self> {
        for (name, m) in [("car_to_model", &car_to_model), ("car_to_bb", &car_to_bb)] {
            if m.ncols() != 3 || m.nrows() < 2 {
                return Err(ReplayError::dimension(format!(
                    "{} must be Kx3 with K >= 2, got {}x{}",
                    name,
                    m.nrows(),
                    m.ncols()
                )));
            }
        }
        Ok(Self {
            car_to_model,
            car_to_bb,
        })
    }

    /// Build from row-major 3x3 arrays.
    pub fn from_rows(car_to_model: [[f64; 3]; 3], car_to_bb: [[f64; 3]; 3]) -> Self {
        Self {
            car_to_model: DMatrix::from_fn(3, 3, |r, c| car_to_model[r][c]),
            car_to_bb: DMatrix::from_fn(3, 3, |r, c| car_to_bb[r][c]),
        }
    }

    /// Ground plane -> model input image.
    pub fn car_to_model(&self) -> &DMatrix<f64> {
        &self.car_to_model
    }

    /// Ground plane -> bounding-box (display) image.
    pub fn car_to_bb(&self) -> &DMatrix<f64> {
        &self.car_to_bb
    }

    /// Load a calibration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let file: CalibrationFile = serde_json::from_str(&text)?;
        Ok(Self::from_rows(file.car_to_model, file.car_to_bb))
    }

    /// Ground-plane homography of a forward-looking pinhole camera.
    ///
    /// Input points are `(longitudinal, lateral)` in meters with lateral
    /// positive to the left. The camera sits `height` meters above the road
    /// with its optical axis parallel to it.
    pub fn pinhole_ground(focal: f64, cx: f64, cy: f64, height: f64) -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            3,
            &[
                cx, -focal, 0.0, //
                cy, 0.0, focal * height, //
                1.0, 0.0, 0.0,
            ],
        )
    }
}
