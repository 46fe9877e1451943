//! Live telemetry line plots rendered to a raster surface.
//!
//! The rendering loop only depends on [`PlotRenderer`]: give it the current
//! telemetry history and it returns an RGB surface that can be composited
//! onto the camera frame with [`composite`]. [`RasterPlotRenderer`] is the
//! built-in backend; it draws stacked subplots with `imageproc` polylines
//! clipped to each panel, and no text.

use std::collections::HashMap;
use std::str::FromStr;

use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, BresenhamLineIter};
use imageproc::rect::Rect;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};
use crate::top_down::Rgb;

/// Figure background (20% grey).
const FIGURE_BACKGROUND: Rgb = [51, 51, 51];

/// Subplot patch (40% grey).
const PATCH_BACKGROUND: Rgb = [102, 102, 102];

/// Outer margin and gap between stacked subplots, in pixels.
const MARGIN: u32 = 8;

/// Something that turns a telemetry history into a plot surface.
pub trait PlotRenderer {
    /// Render one frame of plots for the current history.
    fn render_frame(&mut self, data: &Telemetry) -> Result<RgbImage>;
}

/// A rolling history of named telemetry channels.
///
/// Rows are samples (oldest first), columns are channels.
#[derive(Debug, Clone)]
pub struct Telemetry {
    samples: DMatrix<f64>,
    columns: HashMap<String, usize>,
}

impl Telemetry {
    /// Wrap an existing sample matrix. `names[i]` labels column `i`.
    pub fn new(names: &[&str], samples: DMatrix<f64>) -> Result<Self> {
        if names.len() != samples.ncols() {
            return Err(ReplayError::dimension(format!(
                "{} channel names for {} telemetry columns",
                names.len(),
                samples.ncols()
            )));
        }
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Ok(Self { samples, columns })
    }

    /// A zero-filled history of `len` samples.
    pub fn zeros(names: &[&str], len: usize) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self {
            samples: DMatrix::zeros(len, names.len()),
            columns,
        }
    }

    /// Column of a named channel.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn samples(&self) -> &DMatrix<f64> {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    /// Drop the oldest sample and append `row` as the newest.
    pub fn push(&mut self, row: &[f64]) -> Result<()> {
        let (len, channels) = self.samples.shape();
        if row.len() != channels {
            return Err(ReplayError::dimension(format!(
                "telemetry row has {} values, expected {}",
                row.len(),
                channels
            )));
        }
        if len == 0 {
            return Ok(());
        }
        for r in 1..len {
            for c in 0..channels {
                self.samples[(r - 1, c)] = self.samples[(r, c)];
            }
        }
        for (c, &value) in row.iter().enumerate() {
            self.samples[(len - 1, c)] = value;
        }
        Ok(())
    }
}

/// Line dash pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStyle {
    #[serde(rename = "-")]
    Solid,
    #[serde(rename = "--")]
    Dashed,
    #[serde(rename = ":")]
    Dotted,
    #[serde(rename = "-.")]
    DashDot,
}

impl LineStyle {
    /// Whether the `step`-th pixel along the line is inked.
    fn inked(self, step: usize) -> bool {
        match self {
            LineStyle::Solid => true,
            LineStyle::Dashed => step % 8 < 5,
            LineStyle::Dotted => step % 3 == 0,
            LineStyle::DashDot => matches!(step % 12, 0..=4 | 8),
        }
    }
}

impl FromStr for LineStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "-" => Ok(LineStyle::Solid),
            "--" => Ok(LineStyle::Dashed),
            ":" => Ok(LineStyle::Dotted),
            "-." => Ok(LineStyle::DashDot),
            _ => Err(format!("Unknown line style: {}", s)),
        }
    }
}

/// Single-letter plot colours.
pub fn plot_color(code: char) -> Option<Rgb> {
    match code {
        'r' => Some([255, 0, 0]),
        'g' => Some([0, 255, 0]),
        'b' => Some([0, 0, 255]),
        'k' => Some([0, 0, 0]),
        'y' => Some([255, 255, 0]),
        'p' => Some([0, 255, 255]),
        'm' => Some([255, 0, 255]),
        _ => None,
    }
}

/// One line in a subplot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    /// Telemetry channel name
    pub name: String,
    /// Colour code, see [`plot_color`]
    pub color: char,
    pub style: LineStyle,
}

/// One stacked subplot with fixed axis limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubplotSpec {
    /// Sample-index range shown on the x axis
    pub x_lim: (f64, f64),
    pub y_lim: (f64, f64),
    pub series: Vec<SeriesSpec>,
}

/// Output surface size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FigureSize {
    /// 640 x 480
    #[default]
    Normal,
    /// 640 x 700
    Big,
    Custom(u32, u32),
}

impl FigureSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FigureSize::Normal => (640, 480),
            FigureSize::Big => (640, 700),
            FigureSize::Custom(w, h) => (w, h),
        }
    }
}

/// Full plot layout: subplots top to bottom plus the figure size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlotLayout {
    pub subplots: Vec<SubplotSpec>,
    #[serde(default)]
    pub size: FigureSize,
}

impl PlotLayout {
    /// Build a layout from parallel per-subplot lists.
    ///
    /// `names[i]`, `colors[i]` and `styles[i]` describe the series of
    /// subplot `i` and must have matching lengths.
    pub fn from_lists(
        x_lims: &[(f64, f64)],
        y_lims: &[(f64, f64)],
        names: &[Vec<&str>],
        colors: &[&str],
        styles: &[Vec<&str>],
        size: FigureSize,
    ) -> Result<Self> {
        let n = y_lims.len();
        if x_lims.len() != n || names.len() != n || colors.len() != n || styles.len() != n {
            return Err(ReplayError::dimension(format!(
                "plot lists disagree: {} x_lims, {} y_lims, {} name lists, {} color lists, {} style lists",
                x_lims.len(),
                n,
                names.len(),
                colors.len(),
                styles.len()
            )));
        }

        let mut subplots = Vec::with_capacity(n);
        for i in 0..n {
            let codes: Vec<char> = colors[i].chars().collect();
            if codes.len() != names[i].len() || styles[i].len() != names[i].len() {
                return Err(ReplayError::dimension(format!(
                    "subplot {} has {} series, {} colors and {} styles",
                    i,
                    names[i].len(),
                    codes.len(),
                    styles[i].len()
                )));
            }
            let mut series = Vec::with_capacity(names[i].len());
            for ((name, color), style) in names[i].iter().zip(codes).zip(&styles[i]) {
                let style = style.parse().map_err(ReplayError::InvalidConfig)?;
                series.push(SeriesSpec {
                    name: name.to_string(),
                    color,
                    style,
                });
            }
            subplots.push(SubplotSpec {
                x_lim: x_lims[i],
                y_lim: y_lims[i],
                series,
            });
        }
        Ok(Self { subplots, size })
    }
}

/// Placement and axis limits of one subplot.
#[derive(Debug, Clone, Copy)]
struct Panel {
    left: i64,
    top: i64,
    width: u32,
    height: u32,
    x_lim: (f64, f64),
    y_lim: (f64, f64),
}

impl Panel {
    /// Panel-local pixel of a sample.
    fn to_pixel(&self, index: f64, value: f64) -> (f32, f32) {
        let fx = (index - self.x_lim.0) / (self.x_lim.1 - self.x_lim.0);
        let fy = (value - self.y_lim.0) / (self.y_lim.1 - self.y_lim.0);
        let right = (self.width - 1) as f64;
        let bottom = (self.height - 1) as f64;
        ((fx * right) as f32, (bottom - fy * bottom) as f32)
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedSeries {
    column: usize,
    color: Rgb,
    style: LineStyle,
    panel: usize,
}

/// Segments longer than this (in pixels along either axis) are skipped.
const MAX_SEGMENT_PIXELS: f32 = 1.0e6;

/// Software line-plot backend.
pub struct RasterPlotRenderer {
    width: u32,
    height: u32,
    panels: Vec<Panel>,
    series: Vec<ResolvedSeries>,
    num_columns: usize,
}

impl RasterPlotRenderer {
    /// Validate `layout` against the channels of `telemetry` and fix the
    /// panel geometry. Channel lookups happen once, here.
    pub fn new(layout: &PlotLayout, telemetry: &Telemetry) -> Result<Self> {
        if layout.subplots.is_empty() {
            return Err(ReplayError::EmptyInput("plot layout"));
        }
        let (width, height) = layout.size.dimensions();
        let n = layout.subplots.len() as u32;
        let min_height = MARGIN * 2 + MARGIN * (n - 1) + 2 * n;
        if width < MARGIN * 2 + 2 || height < min_height {
            return Err(ReplayError::config(format!(
                "figure {}x{} is too small for {} subplots",
                width, height, n
            )));
        }

        let panel_width = width - 2 * MARGIN;
        let panel_height = (height - 2 * MARGIN - MARGIN * (n - 1)) / n;

        let mut panels = Vec::with_capacity(layout.subplots.len());
        let mut series = Vec::new();
        for (i, sub) in layout.subplots.iter().enumerate() {
            let limits_ok = sub.x_lim.1 > sub.x_lim.0
                && sub.y_lim.1 > sub.y_lim.0
                && [sub.x_lim.0, sub.x_lim.1, sub.y_lim.0, sub.y_lim.1]
                    .iter()
                    .all(|v| v.is_finite());
            if !limits_ok {
                return Err(ReplayError::config(format!(
                    "subplot {} has empty or non-finite limits x={:?} y={:?}",
                    i, sub.x_lim, sub.y_lim
                )));
            }

            panels.push(Panel {
                left: MARGIN as i64,
                top: (MARGIN + i as u32 * (panel_height + MARGIN)) as i64,
                width: panel_width,
                height: panel_height,
                x_lim: sub.x_lim,
                y_lim: sub.y_lim,
            });

            for spec in &sub.series {
                let column = telemetry
                    .column(&spec.name)
                    .ok_or_else(|| ReplayError::UnknownSeries(spec.name.clone()))?;
                let color = plot_color(spec.color)
                    .ok_or_else(|| ReplayError::UnknownColor(spec.color.to_string()))?;
                series.push(ResolvedSeries {
                    column,
                    color,
                    style: spec.style,
                    panel: i,
                });
            }
        }

        tracing::debug!(
            "Plot renderer {}x{} with {} subplots and {} series",
            width,
            height,
            panels.len(),
            series.len()
        );

        Ok(Self {
            width,
            height,
            panels,
            series,
            num_columns: telemetry.samples().ncols(),
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_series(
        canvas: &mut RgbImage,
        panel: &Panel,
        series: &ResolvedSeries,
        data: &DMatrix<f64>,
    ) {
        let color = image::Rgb(series.color);
        let (width, height) = canvas.dimensions();
        let column = data.column(series.column);
        let mut step = 0usize;
        for i in 1..column.len() {
            let a = panel.to_pixel((i - 1) as f64, column[i - 1]);
            let b = panel.to_pixel(i as f64, column[i]);
            if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
                continue;
            }
            if (b.0 - a.0).abs() > MAX_SEGMENT_PIXELS || (b.1 - a.1).abs() > MAX_SEGMENT_PIXELS {
                continue;
            }
            if series.style == LineStyle::Solid {
                draw_line_segment_mut(canvas, a, b, color);
                continue;
            }
            for (x, y) in BresenhamLineIter::new(a, b) {
                let on_canvas = x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height;
                if on_canvas && series.style.inked(step) {
                    canvas.put_pixel(x as u32, y as u32, color);
                }
                step += 1;
            }
        }
    }
}

impl PlotRenderer for RasterPlotRenderer {
    fn render_frame(&mut self, data: &Telemetry) -> Result<RgbImage> {
        if data.samples().ncols() != self.num_columns {
            return Err(ReplayError::dimension(format!(
                "renderer was built for {} channels, telemetry has {}",
                self.num_columns,
                data.samples().ncols()
            )));
        }

        let mut img = RgbImage::from_pixel(self.width, self.height, image::Rgb(FIGURE_BACKGROUND));
        for (index, panel) in self.panels.iter().enumerate() {
            let mut canvas = RgbImage::new(panel.width, panel.height);
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(0, 0).of_size(panel.width, panel.height),
                image::Rgb(PATCH_BACKGROUND),
            );
            for series in self.series.iter().filter(|s| s.panel == index) {
                Self::draw_series(&mut canvas, panel, series, data.samples());
            }
            image::imageops::replace(&mut img, &canvas, panel.left, panel.top);
        }
        Ok(img)
    }
}

/// Copy `plot` onto `frame` with its top-left corner at `(x, y)`.
/// Parts falling outside the frame are dropped.
pub fn composite(frame: &mut RgbImage, plot: &RgbImage, x: i64, y: i64) {
    image::imageops::replace(frame, plot, x, y);
}
