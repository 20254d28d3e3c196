//! Font loading, text measurement and glyph drawing for composite bands.
//!
//! A TrueType face is preferred: its metrics are read with `ttf-parser` and
//! glyphs are rasterised with `ab_glyph`. When no face can be loaded we fall
//! back to the built-in 8×8 bitmap glyph set, so font trouble never stops a
//! report.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};

/// Font files tried, in order, when no explicit font is configured.
pub const FONT_CANDIDATES: [&str; 5] = [
    "arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Side length of a built-in glyph cell, in pixels.
const BUILTIN_CELL: u32 = 8;

/// A parsed TrueType face with metrics.
struct TrueTypeFace {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    bytes: Vec<u8>,
    units_per_em: f32,
    font: FontVec,
}

enum Glyphs {
    TrueType(Box<TrueTypeFace>),
    Builtin,
}

/// The glyph source used to draw band text.
pub struct FontManager {
    glyphs: Glyphs,
    origin: Option<PathBuf>,
}

impl FontManager {
    /// Built-in bitmap glyphs only.
    pub fn builtin() -> Self {
        Self {
            glyphs: Glyphs::Builtin,
            origin: None,
        }
    }

    /// Parse a TTF/OTF font from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        let units_per_em = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?
            .units_per_em() as f32;
        let font = FontVec::try_from_vec(bytes.clone())
            .map_err(|e| format!("Failed to load font outlines: {e}"))?;
        Ok(Self {
            glyphs: Glyphs::TrueType(Box::new(TrueTypeFace {
                bytes,
                units_per_em,
                font,
            })),
            origin: None,
        })
    }

    /// Load the preferred font, falling back to the candidate list and then
    /// to the built-in glyphs. Never fails.
    pub fn load(preferred: Option<&Path>) -> Self {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match Self::from_bytes(bytes) {
                Ok(mut mgr) => {
                    log::debug!("using font '{}'", path.display());
                    mgr.origin = Some(path);
                    return mgr;
                }
                Err(e) => log::debug!("skipping font '{}': {e}", path.display()),
            }
        }
        if let Some(path) = preferred {
            log::warn!(
                "font '{}' unavailable; using built-in glyphs",
                path.display()
            );
        } else {
            log::debug!("no TrueType font found; using built-in glyphs");
        }
        Self::builtin()
    }

    /// Check if a real TrueType face is loaded.
    pub fn has_real_font(&self) -> bool {
        matches!(self.glyphs, Glyphs::TrueType(_))
    }

    /// Path of the loaded font file, if it came from disk.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Measure the width of a string at a given font size (in px).
    pub fn measure_text_width(&self, text: &str, font_size: f32) -> f32 {
        match &self.glyphs {
            Glyphs::Builtin => {
                text.chars().count() as f32 * (BUILTIN_CELL * builtin_scale(font_size)) as f32
            }
            Glyphs::TrueType(face) => {
                let Ok(parsed) = ttf_parser::Face::parse(&face.bytes, 0) else {
                    return text.chars().count() as f32 * font_size * 0.5;
                };
                let scale = font_size / face.units_per_em;
                text.chars()
                    .map(|ch| match parsed.glyph_index(ch) {
                        Some(gid) => parsed.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        // Fallback for missing glyph
                        None => font_size * 0.5,
                    })
                    .sum()
            }
        }
    }

    /// Draw one line of text with its top-left corner at `(x, y)`. Pixels
    /// outside the canvas are clipped.
    pub fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        x: i32,
        y: i32,
        font_size: f32,
        color: Rgba<u8>,
    ) {
        match &self.glyphs {
            Glyphs::TrueType(face) => draw_outline_text(canvas, &face.font, text, x, y, font_size, color),
            Glyphs::Builtin => draw_builtin_text(canvas, text, x, y, font_size, color),
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::load(None)
    }
}

/// Integer upscale applied to built-in glyphs so they stay within a line.
fn builtin_scale(font_size: f32) -> u32 {
    ((font_size / BUILTIN_CELL as f32).floor() as u32).max(1)
}

fn draw_outline_text(
    canvas: &mut RgbaImage,
    font: &FontVec,
    text: &str,
    x: i32,
    y: i32,
    font_size: f32,
    color: Rgba<u8>,
) {
    let scaled = font.as_scaled(PxScale::from(font_size));
    let mut caret = point(x as f32, y as f32 + scaled.ascent());
    for ch in text.chars() {
        let mut glyph = scaled.scaled_glyph(ch);
        glyph.position = caret;
        caret.x += scaled.h_advance(glyph.id);
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let px = bounds.min.x as i32 + gx as i32;
            let py = bounds.min.y as i32 + gy as i32;
            blend(canvas, px, py, color, coverage);
        });
    }
}

fn draw_builtin_text(
    canvas: &mut RgbaImage,
    text: &str,
    x: i32,
    y: i32,
    font_size: f32,
    color: Rgba<u8>,
) {
    let scale = builtin_scale(font_size) as i32;
    let advance = BUILTIN_CELL as i32 * scale;
    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = BASIC_FONTS.get(ch).or_else(|| LATIN_FONTS.get(ch)) else {
            continue;
        };
        let origin_x = x + i as i32 * advance;
        for (row_idx, bits) in rows.iter().enumerate() {
            for col_idx in 0..BUILTIN_CELL as i32 {
                // Least significant bit is the leftmost pixel.
                if bits & (1 << col_idx) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        blend(
                            canvas,
                            origin_x + col_idx * scale + dx,
                            y + row_idx as i32 * scale + dy,
                            color,
                            1.0,
                        );
                    }
                }
            }
        }
    }
}

/// Alpha-blend `color` onto the pixel at `(x, y)` with the given coverage.
fn blend(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0) * color[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let mixed = color[c] as f32 * alpha + dst[c] as f32 * (1.0 - alpha);
        dst[c] = mixed.round() as u8;
    }
    dst[3] = dst[3].max((alpha * 255.0).round() as u8);
}
