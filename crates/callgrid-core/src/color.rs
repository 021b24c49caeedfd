//! Colors and the node palette.
//!
//! Colors serialize as `#RRGGBB` (or `#RRGGBBAA` when translucent) so
//! persisted layout documents stay readable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color `{0}`, expected #RRGGBB or #RRGGBBAA")]
pub struct ColorParseError(pub String);

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` / `#RRGGBBAA`; the leading `#` is optional.
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.trim().trim_start_matches('#');
        let err = || ColorParseError(hex.to_string());
        if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| err());
        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Scale alpha by `opacity` (clamped to 0..=1).
    pub fn faded(self, opacity: f32) -> Self {
        let a = (self.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
        self.with_alpha(a)
    }

    pub fn lighten(&self, factor: f32) -> Self {
        Self {
            r: ((self.r as f32) + (255.0 - self.r as f32) * factor) as u8,
            g: ((self.g as f32) + (255.0 - self.g as f32) * factor) as u8,
            b: ((self.b as f32) + (255.0 - self.b as f32) * factor) as u8,
            a: self.a,
        }
    }

    pub fn darken(&self, factor: f32) -> Self {
        Self {
            r: ((self.r as f32) * (1.0 - factor)) as u8,
            g: ((self.g as f32) * (1.0 - factor)) as u8,
            b: ((self.b as f32) * (1.0 - factor)) as u8,
            a: self.a,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Node palette, indexed by name hash.
pub const PALETTE: [Color; 16] = [
    Color::rgb(0xC5, 0x86, 0xC0),
    Color::rgb(0x56, 0x9C, 0xD6),
    Color::rgb(0x9C, 0xDC, 0xFE),
    Color::rgb(0x4E, 0xC9, 0xB0),
    Color::rgb(0xCE, 0x91, 0x78),
    Color::rgb(0xB5, 0xCE, 0xA8),
    Color::rgb(0xDC, 0xDC, 0xAA),
    Color::rgb(0xD4, 0xD4, 0xD4),
    Color::rgb(0x6A, 0x99, 0x55),
    Color::rgb(0xD1, 0x69, 0x69),
    Color::rgb(0xD7, 0xBA, 0x7D),
    Color::rgb(0x56, 0x9C, 0xD6),
    Color::rgb(0x9C, 0xDC, 0xFE),
    Color::rgb(0x4E, 0xC9, 0xB0),
    Color::rgb(0xCE, 0x91, 0x78),
    Color::rgb(0xB5, 0xCE, 0xA8),
];

/// Stable palette pick: `h = c + 31 * h` over the chars of `name`.
pub fn palette_color(name: &str) -> Color {
    let hash = name
        .chars()
        .fold(0i64, |h, c| (c as i64).wrapping_add(h.wrapping_mul(31)));
    PALETTE[(hash.unsigned_abs() % PALETTE.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Color::from_hex("#1f1f20").unwrap(), Color::rgb(0x1F, 0x1F, 0x20));
        assert_eq!(Color::from_hex("FFFFFF0F").unwrap(), Color::rgba(255, 255, 255, 15));
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#GG0000").is_err());
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(Color::rgb(0xD1, 0x69, 0x69).to_hex(), "#D16969");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_hex(), "#01020304");
    }

    #[test]
    fn test_serde_uses_hex_strings() {
        let json = serde_json::to_string(&Color::rgb(0x4F, 0xC3, 0xF7)).unwrap();
        assert_eq!(json, "\"#4FC3F7\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(0x4F, 0xC3, 0xF7));
        assert!(serde_json::from_str::<Color>("\"blue\"").is_err());
    }

    #[test]
    fn test_palette_pick_is_deterministic() {
        // 'a' = 97, 97 % 16 = 1
        assert_eq!(palette_color("a"), PALETTE[1]);
        assert_eq!(palette_color("render_frame"), palette_color("render_frame"));
        assert_eq!(palette_color(""), PALETTE[0]);
    }

    #[test]
    fn test_faded_scales_alpha() {
        assert_eq!(Color::WHITE.faded(0.5).a, 128);
        assert_eq!(Color::WHITE.faded(2.0).a, 255);
    }
}
