//! Drawing documents
//!
//! A drawing is stored as JSON: a viewport transform and a list of strokes,
//! each stroke a polyline with a per-point girth. Drawings export to SVG.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrawingError {
    #[error("drawing is invalid")]
    Invalid,
}

/// Palette entry, resolved to a concrete color at export time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorAlias {
    Black,
    White,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl ColorAlias {
    /// Light-theme RGB value
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            ColorAlias::Black => (0x00, 0x00, 0x00),
            ColorAlias::White => (0xff, 0xff, 0xff),
            ColorAlias::Red => (0xdf, 0x2a, 0x2a),
            ColorAlias::Green => (0x30, 0xa1, 0x4e),
            ColorAlias::Yellow => (0xf2, 0xc1, 0x1f),
            ColorAlias::Blue => (0x1e, 0x5a, 0xd6),
            ColorAlias::Magenta => (0xb0, 0x3a, 0xd2),
            ColorAlias::Cyan => (0x17, 0xa8, 0xc4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points_x: Vec<f32>,
    pub points_y: Vec<f32>,
    pub points_girth: Vec<f32>,
    pub color: ColorAlias,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub scale: f32,
    pub translation_x: f32,
    pub translation_y: f32,
    pub strokes: Vec<Stroke>,
}

impl Default for Drawing {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translation_x: 0.0,
            translation_y: 0.0,
            strokes: Vec::new(),
        }
    }
}

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawingFormat {
    Svg,
}

impl std::str::FromStr for DrawingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "svg" => Ok(DrawingFormat::Svg),
            other => Err(format!("unsupported drawing format '{other}'")),
        }
    }
}

impl Drawing {
    /// Parses stored bytes; empty content is an empty drawing
    pub fn parse(bytes: &[u8]) -> Result<Self, DrawingError> {
        if bytes.is_empty() {
            return Ok(Drawing::default());
        }
        let drawing: Drawing = serde_json::from_slice(bytes).map_err(|_| DrawingError::Invalid)?;
        drawing.validate()?;
        Ok(drawing)
    }

    pub fn validate(&self) -> Result<(), DrawingError> {
        if self.scale <= 0.0 {
            return Err(DrawingError::Invalid);
        }
        for stroke in &self.strokes {
            if stroke.points_x.len() != stroke.points_y.len()
                || stroke.points_y.len() != stroke.points_girth.len()
            {
                return Err(DrawingError::Invalid);
            }
            if !(0.0..=1.0).contains(&stroke.alpha) {
                return Err(DrawingError::Invalid);
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DrawingError> {
        self.validate()?;
        serde_json::to_vec(self).map_err(|_| DrawingError::Invalid)
    }

    pub fn export(&self, format: DrawingFormat) -> Result<Vec<u8>, DrawingError> {
        match format {
            DrawingFormat::Svg => Ok(self.to_svg().into_bytes()),
        }
    }

    /// Renders the drawing as a standalone SVG document
    ///
    /// Each segment becomes its own line so girth can vary along a stroke.
    pub fn to_svg(&self) -> String {
        let (width, height) = self.bounds();
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
        );

        for stroke in &self.strokes {
            let (r, g, b) = stroke.color.rgb();
            for i in 1..stroke.points_x.len() {
                let (x1, y1) = self.project(stroke.points_x[i - 1], stroke.points_y[i - 1]);
                let (x2, y2) = self.project(stroke.points_x[i], stroke.points_y[i]);
                let girth = stroke.points_girth[i] * self.scale;
                let _ = write!(
                    svg,
                    "<line x1=\"{x1}\" y1=\"{y1}\" x2=\"{x2}\" y2=\"{y2}\" stroke=\"rgb({r},{g},{b})\" stroke-opacity=\"{}\" stroke-width=\"{girth}\" stroke-linecap=\"round\"/>",
                    stroke.alpha
                );
            }
        }

        svg.push_str("</svg>");
        svg
    }

    fn project(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x + self.translation_x) * self.scale,
            (y + self.translation_y) * self.scale,
        )
    }

    fn bounds(&self) -> (u32, u32) {
        let mut max_x: f32 = 0.0;
        let mut max_y: f32 = 0.0;
        for stroke in &self.strokes {
            for (i, (x, y)) in stroke.points_x.iter().zip(&stroke.points_y).enumerate() {
                let (px, py) = self.project(*x, *y);
                let pad = stroke.points_girth[i] * self.scale;
                max_x = max_x.max(px + pad);
                max_y = max_y.max(py + pad);
            }
        }
        (max_x.ceil().max(1.0) as u32, max_y.ceil().max(1.0) as u32)
    }
}
