//! Caption text and styling for a collage cell
//!
//! Captions are plain data: the grid stores them, history snapshots copy
//! them, and recovery records serialize them. Rasterizing a caption belongs
//! to the export renderer.

use serde::{Deserialize, Serialize};

/// RGBA colour, serialized as `[r, g, b, a]`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "Vec<u8>", into = "[u8; 4]")]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }
}

impl From<Color> for [u8; 4] {
    fn from(color: Color) -> Self {
        color.0
    }
}

/// Missing colour channels are zero; a missing alpha is opaque
impl From<Vec<u8>> for Color {
    fn from(channels: Vec<u8>) -> Self {
        let mut rgba = [0, 0, 0, 255];
        for (slot, value) in rgba.iter_mut().zip(channels) {
            *slot = value;
        }
        Self(rgba)
    }
}

/// Which caption of a cell
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaptionSlot {
    Top,
    Bottom,
}

/// Text styling shared by captions.
///
/// Also used as the editor-wide default applied to newly created captions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_family: String,
    /// Smallest font size the renderer may shrink to when fitting text
    pub min_size: u32,
    /// Largest font size the renderer may use
    pub max_size: u32,
    /// Outline width in pixels (0 = no outline)
    pub stroke_width: u32,
    pub stroke_color: Color,
    pub fill_color: Color,
    pub uppercase: bool,
}

impl Default for CaptionStyle {
    /// Classic meme captions: bold white text with a black outline
    fn default() -> Self {
        Self {
            font_family: "Impact".to_string(),
            min_size: 12,
            max_size: 48,
            stroke_width: 2,
            stroke_color: Color::BLACK,
            fill_color: Color::WHITE,
            uppercase: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    #[serde(default)]
    pub style: CaptionStyle,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

impl Caption {
    pub fn new(text: impl Into<String>, style: CaptionStyle) -> Self {
        Self {
            text: text.into(),
            style,
            visible: true,
        }
    }

    /// Text as the renderer should draw it
    pub fn display_text(&self) -> String {
        if self.style.uppercase {
            self.text.to_uppercase()
        } else {
            self.text.clone()
        }
    }

    /// Nothing to draw: hidden or blank
    pub fn is_blank(&self) -> bool {
        !self.visible || self.text.trim().is_empty()
    }
}
