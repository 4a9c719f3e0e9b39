use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Linear RGB color with channels in `0.0..=1.0`.
///
/// Laid out as three packed floats so a slice of colors can be uploaded as an
/// instance attribute without conversion. Serializes as a `#rrggbb` string.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// A color string that is not of the form `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color '{}', expected #rrggbb", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl RgbColor {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    /// Packs the color back into `0xRRGGBB`, rounding each channel.
    pub fn to_hex(&self) -> u32 {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Multiplies every channel by `factor` and clamps the result to `0.0..=1.0`.
    pub fn scaled_clamped(&self, factor: f32) -> Self {
        Self::new(
            (self.r * factor).clamp(0.0, 1.0),
            (self.g * factor).clamp(0.0, 1.0),
            (self.b * factor).clamp(0.0, 1.0),
        )
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[f32; 3]> for RgbColor {
    fn from(value: [f32; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_hex())
    }
}

impl FromStr for RgbColor {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseColorError(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Self::from_hex)
            .map_err(|_| ParseColorError(s.to_string()))
    }
}

impl Serialize for RgbColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RgbColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EPSILON;

    #[test]
    fn test_color_from_hex() {
        let color = RgbColor::from_hex(0xff8000);

        assert!((color.r - 1.0).abs() < EPSILON);
        assert!((color.g - 128.0 / 255.0).abs() < EPSILON);
        assert!(color.b.abs() < EPSILON);
        assert_eq!(color.to_hex(), 0xff8000);
    }

    #[test]
    fn test_color_parse() {
        assert_eq!("#00ff00".parse::<RgbColor>().unwrap(), RgbColor::new(0.0, 1.0, 0.0));
        assert_eq!("0000ff".parse::<RgbColor>().unwrap(), RgbColor::new(0.0, 0.0, 1.0));
        assert!("#12345".parse::<RgbColor>().is_err());
        assert!("#gg0000".parse::<RgbColor>().is_err());
    }

    #[test]
    fn test_color_scaled_clamped() {
        let color = RgbColor::new(0.5, 0.95, 0.0).scaled_clamped(1.1);

        assert!((color.r - 0.55).abs() < EPSILON);
        assert_eq!(color.g, 1.0);
        assert_eq!(color.b, 0.0);
    }

    #[test]
    fn test_color_serde_hex_string() {
        let json = serde_json::to_string(&RgbColor::from_hex(0x1a2b3c)).unwrap();
        assert_eq!(json, "\"#1a2b3c\"");

        let back: RgbColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_hex(), 0x1a2b3c);
        assert!(serde_json::from_str::<RgbColor>("\"red\"").is_err());
    }
}
