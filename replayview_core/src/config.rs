//! UI configuration constants for the top-down grid and overlays.
//!
//! The grid geometry (extents, zoom and car origin) is fixed once a
//! [`UiParams`] is built and validated. Draw calls only ever read it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ReplayError, Result};

/// Largest grid area accepted, in cells (one byte each).
pub const MAX_GRID_CELLS: usize = 1 << 26;

/// Configuration for the top-down grid and the camera overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiParams {
    /// Grid width in pixels (lateral axis)
    pub lidar_x: usize,

    /// Grid height in pixels (longitudinal axis)
    pub lidar_y: usize,

    /// Pixels per meter
    pub lidar_zoom: f64,

    /// Car origin column on the grid
    pub lidar_car_x: f64,

    /// Car origin row on the grid
    pub lidar_car_y: f64,

    /// Half width of the ego car footprint in grid pixels
    pub car_hwidth: f64,

    /// Distance from origin to the car's front bumper in grid pixels
    pub car_front: f64,

    /// Distance from origin to the car's rear bumper in grid pixels
    pub car_back: f64,

    /// Palette index used for the ego car footprint
    pub car_color: u8,

    /// Lead-car bar reach: the bar extends `2 * meter_width` grid cells
    /// to each side of the car origin
    pub meter_width: f64,

    /// Half length of the lead marker cross in image pixels
    pub lead_marker_size: u32,

    /// Vertical lift of the lead marker above the projected point
    pub lead_marker_offset: u32,
}

impl Default for UiParams {
    fn default() -> Self {
        let lidar_x = 384;
        let lidar_y = 960;
        let lidar_zoom = 6.0;
        Self {
            lidar_x,
            lidar_y,
            lidar_zoom,
            lidar_car_x: lidar_x as f64 / 2.0,
            lidar_car_y: lidar_y as f64 / 1.1,
            car_hwidth: 1.7272 / 2.0 * lidar_zoom,
            car_front: 2.6924 * lidar_zoom,
            car_back: 1.8796 * lidar_zoom,
            car_color: 110,
            meter_width: 20.0,
            lead_marker_size: 10,
            lead_marker_offset: 5,
        }
    }
}

impl UiParams {
    /// Load parameters from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject geometry that would make every grid write meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.lidar_x == 0 || self.lidar_y == 0 {
            return Err(ReplayError::config(format!(
                "grid extents must be positive, got {}x{}",
                self.lidar_x, self.lidar_y
            )));
        }
        match self.lidar_x.checked_mul(self.lidar_y) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(ReplayError::config(format!(
                    "grid {}x{} exceeds {} cells",
                    self.lidar_x, self.lidar_y, MAX_GRID_CELLS
                )))
            }
        }
        if !(self.lidar_zoom.is_finite() && self.lidar_zoom > 0.0) {
            return Err(ReplayError::config(format!(
                "lidar_zoom must be positive and finite, got {}",
                self.lidar_zoom
            )));
        }
        let origin_ok = self.lidar_car_x >= 0.0
            && self.lidar_car_y >= 0.0
            && self.lidar_car_x < self.lidar_x as f64
            && self.lidar_car_y < self.lidar_y as f64;
        if !origin_ok {
            return Err(ReplayError::config(format!(
                "car origin ({}, {}) is outside the {}x{} grid",
                self.lidar_car_x, self.lidar_car_y, self.lidar_x, self.lidar_y
            )));
        }
        if self.meter_width < 0.0 {
            return Err(ReplayError::config("meter_width must not be negative"));
        }
        Ok(())
    }
}
