//! Composite renderer – draws a solid text band above or below a structure
//! image and encodes the result as PNG for embedding.
//!
//! Images live only in memory: each composite is rendered, encoded and
//! handed to the sheet, so no temporary files are created.

use std::io::Cursor;
use std::path::Path;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::fonts::FontManager;
use crate::schema::TextPosition;

/// Fixed band styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeStyle {
    /// Font size in px.
    pub font_size: f32,
    /// Gap between band edges and text, in px.
    pub padding: u32,
    /// Extra vertical space between lines, in px.
    pub line_spacing: u32,
    /// Band background colour (RGBA).
    pub background: [u8; 4],
    /// Text colour (RGBA).
    pub text_color: [u8; 4],
    /// Bounding box for plain image-column thumbnails, in px.
    pub thumbnail_size: u32,
}

impl Default for CompositeStyle {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            padding: 8,
            line_spacing: 4,
            background: [255, 255, 255, 255],
            text_color: [0, 0, 0, 255],
            thumbnail_size: 120,
        }
    }
}

impl CompositeStyle {
    /// Pixel height of a band holding `lines` lines, zero for no lines.
    pub fn band_height(&self, lines: usize) -> u32 {
        if lines == 0 {
            return 0;
        }
        let n = lines as u32;
        n * self.font_size.ceil() as u32 + (n - 1) * self.line_spacing + 2 * self.padding
    }
}

/// A rendered image ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Renders composite cells and image thumbnails.
pub struct CompositeRenderer {
    fonts: FontManager,
    style: CompositeStyle,
}

impl CompositeRenderer {
    pub fn new(fonts: FontManager, style: CompositeStyle) -> Self {
        Self { fonts, style }
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    /// Extend `base` with a band holding `lines`, drawn above or below the
    /// original content. The result keeps the base width.
    pub fn compose(&self, base: &RgbaImage, lines: &[&str], position: TextPosition) -> RgbaImage {
        let band = self.style.band_height(lines.len());
        let (width, height) = (base.width(), base.height() + band);
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba(self.style.background));

        let (image_y, band_y) = match position {
            TextPosition::Top => (band, 0),
            TextPosition::Bottom => (0, base.height()),
        };
        imageops::replace(&mut canvas, base, 0, image_y as i64);

        let step = self.style.font_size.ceil() as i32 + self.style.line_spacing as i32;
        let x = self.style.padding as i32;
        let mut y = (band_y + self.style.padding) as i32;
        for line in lines {
            if self.fonts.measure_text_width(line, self.style.font_size) + x as f32 > width as f32 {
                log::debug!("band text {line:?} is wider than the image and will be clipped");
            }
            self.fonts.draw_text(
                &mut canvas,
                line,
                x,
                y,
                self.style.font_size,
                Rgba(self.style.text_color),
            );
            y += step;
        }
        canvas
    }

    /// Open the image at `path`, compose the band and encode as PNG.
    pub fn render_file(
        &self,
        path: &Path,
        lines: &[&str],
        position: TextPosition,
    ) -> Result<RenderedImage, ReportError> {
        let base = image::open(path)?.to_rgba8();
        let composed = self.compose(&base, lines, position);
        encode_png(composed)
    }

    /// Open the image at `path` and shrink it to fit the thumbnail box.
    pub fn thumbnail_file(&self, path: &Path) -> Result<RenderedImage, ReportError> {
        let base = image::open(path)?;
        let bound = self.style.thumbnail_size;
        let thumb = if base.width() > bound || base.height() > bound {
            base.thumbnail(bound, bound)
        } else {
            base
        };
        encode_png(thumb.to_rgba8())
    }
}

fn encode_png(img: RgbaImage) -> Result<RenderedImage, ReportError> {
    let (width, height) = img.dimensions();
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(RenderedImage { width, height, png })
}
