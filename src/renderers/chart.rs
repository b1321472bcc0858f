// document-toolkit/src/renderers/chart.rs

use crate::error::Result;
use crate::stock::TimeSeries;
use image::{ImageFormat, Rgb, RgbImage};
use rust_decimal::prelude::ToPrimitive;
use std::io::Cursor;
use tracing::debug;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Rasterises closing prices as a simple line chart.
#[derive(Debug, Clone, Copy)]
pub struct LineChart {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

impl Default for LineChart {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            padding: 40,
        }
    }
}

impl LineChart {
    /// Plot bounds as `(left, right, top, bottom)`. Padding larger than the
    /// image collapses the plot area instead of wrapping around.
    fn plot_area(&self) -> (u32, u32, u32, u32) {
        let left = self.padding.min(self.width);
        let right = self.width.saturating_sub(self.padding).max(left);
        let top = self.padding.min(self.height);
        let bottom = self.height.saturating_sub(self.padding).max(top);
        (left, right, top, bottom)
    }

    /// Pixel coordinates of each sample inside the plot area.
    pub fn plot_points(&self, series: &TimeSeries) -> Vec<(i64, i64)> {
        let closes: Vec<f64> = series
            .samples()
            .iter()
            .map(|s| s.close.to_f64().unwrap_or(0.0))
            .collect();
        if closes.is_empty() {
            return Vec::new();
        }

        let min = closes.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let span = if max > min { max - min } else { 1.0 };

        let (left, right, top, bottom) = self.plot_area();
        let (left, right, top, bottom) = (left as f64, right as f64, top as f64, bottom as f64);
        let step = if closes.len() > 1 {
            (right - left) / (closes.len() - 1) as f64
        } else {
            0.0
        };

        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let x = left + step * i as f64;
                // A flat series sits in the vertical middle of the plot.
                let y = if max > min {
                    bottom - (close - min) / span * (bottom - top)
                } else {
                    (top + bottom) / 2.0
                };
                (x.round() as i64, y.round() as i64)
            })
            .collect()
    }

    pub fn render(&self, ticker: &str, series: &TimeSeries) -> Result<Vec<u8>> {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        let (left, right, top, bottom) = self.plot_area();
        let (left, right, top, bottom) = (left as i64, right as i64, top as i64, bottom as i64);
        draw_line(&mut canvas, (left, bottom), (right, bottom), AXIS);
        draw_line(&mut canvas, (left, bottom), (left, top), AXIS);

        let points = self.plot_points(series);
        match points.as_slice() {
            [] => {}
            [only] => draw_line(&mut canvas, (left, only.1), (right, only.1), LINE),
            _ => {
                for pair in points.windows(2) {
                    draw_line(&mut canvas, pair[0], pair[1], LINE);
                }
            }
        }

        let mut png = Cursor::new(Vec::new());
        canvas.write_to(&mut png, ImageFormat::Png)?;
        let png = png.into_inner();

        debug!(ticker = %ticker, points = points.len(), size_bytes = png.len(), "Chart rendered");
        Ok(png)
    }
}

/// Bresenham line, clipped to the image bounds.
fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
            canvas.put_pixel(x as u32, y as u32, color);
        }
        if x == to.0 && y == to.1 {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x += sx;
        }
        if doubled <= dx {
            err += dx;
            y += sy;
        }
    }
}
