//! Hex color strings as stored in project files.

use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn parse_hex(input: &str) -> Option<Self> {
        let hex = input.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 => {
                let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::opaque(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Self::opaque(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }

    /// Parse, falling back to `default` on malformed input.
    pub fn parse_or(input: &str, default: Self) -> Self {
        Self::parse_hex(input).unwrap_or_else(|| {
            tracing::warn!(color = input, "Invalid color, using default");
            default
        })
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Rgba8::parse_hex("#ffffff"), Some(Rgba8::WHITE));
        assert_eq!(Rgba8::parse_hex("000"), Some(Rgba8::BLACK));
        assert_eq!(
            Rgba8::parse_hex("#fbe9d080"),
            Some(Rgba8 {
                r: 0xfb,
                g: 0xe9,
                b: 0xd0,
                a: 0x80
            })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Rgba8::parse_hex("#12345").is_none());
        assert!(Rgba8::parse_hex("#gg0000").is_none());
        assert_eq!(Rgba8::parse_or("nope", Rgba8::BLACK), Rgba8::BLACK);
    }
}
