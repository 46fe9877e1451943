//! The top-down "lidar" grid: an indexed-colour raster centred on the ego car.
//!
//! Pixels hold palette indices rather than RGB values. The grid is indexed
//! `[x, y]` with `x` along the lateral axis and `y` along the longitudinal
//! axis (row 0 is the far end of the view).

use std::collections::HashMap;

use crate::config::UiParams;
use crate::error::{ReplayError, Result};

/// Palette index returned when a colour is not in the palette.
pub const NOT_FOUND: u8 = 255;

/// An RGB triple.
pub type Rgb = [u8; 3];

/// Indexed-colour grid with its palette and a per-grid colour lookup table.
#[derive(Debug, Clone)]
pub struct TopDown {
    params: UiParams,
    palette: Vec<Rgb>,
    pixels: Vec<u8>,
    /// Memoized palette lookups, keyed by colour. Cleared with the palette.
    color_cache: HashMap<Rgb, u8>,
}

impl TopDown {
    /// Create a zeroed grid sized from `params`.
    pub fn new(params: UiParams, palette: Vec<Rgb>) -> Result<Self> {
        params.validate()?;
        if palette.len() > 256 {
            return Err(ReplayError::config(format!(
                "palette has {} entries, at most 256 are addressable",
                palette.len()
            )));
        }
        let pixels = vec![0u8; params.lidar_x * params.lidar_y];
        Ok(Self {
            params,
            palette,
            pixels,
            color_cache: HashMap::new(),
        })
    }

    /// Grid geometry. Fixed for the lifetime of the grid.
    pub fn params(&self) -> &UiParams {
        &self.params
    }

    pub fn width(&self) -> usize {
        self.params.lidar_x
    }

    pub fn height(&self) -> usize {
        self.params.lidar_y
    }

    pub fn palette(&self) -> &[Rgb] {
        &self.palette
    }

    /// Swap in a new palette. Previously resolved indices are forgotten.
    pub fn set_palette(&mut self, palette: Vec<Rgb>) -> Result<()> {
        if palette.len() > 256 {
            return Err(ReplayError::config(format!(
                "palette has {} entries, at most 256 are addressable",
                palette.len()
            )));
        }
        self.palette = palette;
        self.color_cache.clear();
        Ok(())
    }

    /// Palette index of `color`, or [`NOT_FOUND`].
    ///
    /// The first matching entry wins. Results (misses included) are cached
    /// until the palette changes.
    pub fn color_index(&mut self, color: Rgb) -> u8 {
        if let Some(&idx) = self.color_cache.get(&color) {
            return idx;
        }
        let idx = self
            .palette
            .iter()
            .position(|&entry| entry == color)
            .map(|i| i as u8)
            .unwrap_or(NOT_FOUND);
        if idx == NOT_FOUND {
            tracing::debug!("Color {:?} not in palette", color);
        }
        self.color_cache.insert(color, idx);
        idx
    }

    /// Number of cached lookups.
    pub fn cached_colors(&self) -> usize {
        self.color_cache.len()
    }

    /// Read a cell, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width() && y < self.height() {
            Some(self.pixels[x * self.height() + y])
        } else {
            None
        }
    }

    /// Write a cell. Returns `false` (and writes nothing) outside the grid.
    pub fn set(&mut self, x: usize, y: usize, index: u8) -> bool {
        if x < self.width() && y < self.height() {
            let h = self.height();
            self.pixels[x * h + y] = index;
            true
        } else {
            false
        }
    }

    /// Reset every cell to palette index 0.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Fill the ego-car footprint around the origin with `car_color`.
    pub fn draw_car(&mut self) {
        let p = &self.params;
        let x0 = (p.lidar_car_x - p.car_hwidth).round().max(0.0) as usize;
        let x1 = (p.lidar_car_x + p.car_hwidth).round().max(0.0) as usize;
        let y0 = (p.lidar_car_y - p.car_front).round().max(0.0) as usize;
        let y1 = (p.lidar_car_y + p.car_back).round().max(0.0) as usize;
        let color = p.car_color;
        for x in x0..x1.min(self.width()) {
            for y in y0..y1.min(self.height()) {
                self.set(x, y, color);
            }
        }
    }

    /// Expand to an RGB image (`width` x `height`). Indices outside the
    /// palette render black.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        let (w, h) = (self.width(), self.height());
        image::RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let idx = self.pixels[x as usize * h + y as usize] as usize;
            image::Rgb(self.palette.get(idx).copied().unwrap_or([0, 0, 0]))
        })
    }
}

/// A 256-entry palette for the top-down view.
///
/// Index 0 is black, the primary overlay colours sit at fixed slots, and the
/// remainder is a grey ramp so `car_color` (110 by default) is visible.
pub fn default_palette() -> Vec<Rgb> {
    let mut palette: Vec<Rgb> = (0..=255u8).map(|v| [v, v, v]).collect();
    palette[1] = [255, 0, 0];
    palette[2] = [0, 255, 0];
    palette[3] = [0, 0, 255];
    palette[4] = [255, 255, 0];
    palette[5] = [0, 255, 255];
    palette[6] = [255, 0, 255];
    palette
}
