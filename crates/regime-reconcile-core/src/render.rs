//! Label image rendering.
//!
//! Label values are looked up in a [`Palette`] and written as PNG. Cluster
//! maps use a rainbow or a palette file; difference maps use the highlight
//! palette so that disagreeing pixels show white on black.

use std::fs;
use std::path::Path;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use tracing::debug;

use crate::diff::HIGHLIGHT;
use crate::error::{ReconcileError, ReconcileResult};
use crate::label_image::LabelImage;

/// Label value to color table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Build from explicit colors, indexed by label.
    pub fn new(colors: Vec<[u8; 3]>) -> ReconcileResult<Self> {
        if colors.is_empty() {
            return Err(ReconcileError::render("palette must not be empty"));
        }
        Ok(Self { colors })
    }

    /// `n` evenly spaced hues from red through violet.
    pub fn rainbow(n: usize) -> Self {
        let n = n.max(1);
        let colors = (0..n)
            .map(|i| {
                // stop short of 360 so the last label is not red again
                let hue = if n == 1 { 0.0 } else { 300.0 * i as f64 / (n - 1) as f64 };
                hsv_to_rgb(hue, 1.0, 1.0)
            })
            .collect();
        Self { colors }
    }

    /// Black for 0, white for [`HIGHLIGHT`]. Other values render grey.
    pub fn highlight() -> Self {
        let mut colors = vec![[128, 128, 128]; usize::from(HIGHLIGHT) + 1];
        colors[0] = [0, 0, 0];
        colors[usize::from(HIGHLIGHT)] = [255, 255, 255];
        Self { colors }
    }

    /// Read a palette file: one `r g b` row per label. Blank lines and `#`
    /// comments are skipped; commas are accepted as separators.
    pub fn from_file(path: &Path) -> ReconcileResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ReconcileError::io(path, e))?;
        let mut colors = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let channels = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(str::parse::<u8>)
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|e| {
                    ReconcileError::format(path, format!("line {}: {}", lineno + 1, e))
                })?;
            match channels.as_slice() {
                [r, g, b] => colors.push([*r, *g, *b]),
                _ => {
                    return Err(ReconcileError::format(
                        path,
                        format!(
                            "line {}: expected 3 channels, found {}",
                            lineno + 1,
                            channels.len()
                        ),
                    ))
                }
            }
        }
        Self::new(colors).map_err(|_| ReconcileError::format(path, "palette has no colors"))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always false; construction rejects empty palettes.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color of `label`.
    pub fn color(&self, label: u8) -> Option<[u8; 3]> {
        self.colors.get(usize::from(label)).copied()
    }
}

/// Produces a raster visualization of a label image.
pub trait Renderer {
    /// Render `image` through `palette` to `path`.
    fn render(&self, image: &LabelImage, palette: &Palette, path: &Path) -> ReconcileResult<()>;
}

/// PNG writer with optional integer upscaling.
#[derive(Debug, Clone, Copy)]
pub struct PngRenderer {
    scale: u32,
}

impl Default for PngRenderer {
    fn default() -> Self {
        Self { scale: 1 }
    }
}

impl PngRenderer {
    /// Renderer writing one output pixel per label pixel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw each label pixel as a `scale` x `scale` block.
    pub fn with_scale(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
        }
    }

    /// Build the RGB raster without writing it.
    pub fn to_rgb(&self, image: &LabelImage, palette: &Palette) -> ReconcileResult<RgbImage> {
        if let Some(max) = image.max_label() {
            if usize::from(max) >= palette.len() {
                return Err(ReconcileError::render(format!(
                    "label {} has no palette entry ({} colors)",
                    max,
                    palette.len()
                )));
            }
        }
        let (height, width) = image.dim();
        let to_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| ReconcileError::render("image too large"))
        };
        let out_w = to_u32(width)?
            .checked_mul(self.scale)
            .ok_or_else(|| ReconcileError::render("image too large"))?;
        let out_h = to_u32(height)?
            .checked_mul(self.scale)
            .ok_or_else(|| ReconcileError::render("image too large"))?;

        let pixels = image.view();
        let scale = self.scale;
        Ok(ImageBuffer::from_fn(out_w, out_h, |x, y| {
            let label = pixels[[(y / scale) as usize, (x / scale) as usize]];
            Rgb(palette.color(label).unwrap_or([0, 0, 0]))
        }))
    }
}

impl Renderer for PngRenderer {
    fn render(&self, image: &LabelImage, palette: &Palette, path: &Path) -> ReconcileResult<()> {
        let raster = self.to_rgb(image, palette)?;
        raster
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| ReconcileError::render(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "rendered label image");
        Ok(())
    }
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> [u8; 3] {
    let c = value * saturation;
    let h = (hue % 360.0) / 60.0;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r), to_byte(g), to_byte(b)]
}
