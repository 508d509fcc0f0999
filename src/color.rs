use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{fmt, str::FromStr};

/// Non-premultiplied sRGB color with alpha, one byte per channel
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    pub const fn red(self) -> u8 {
        self.0[0]
    }

    pub const fn green(self) -> u8 {
        self.0[1]
    }

    pub const fn blue(self) -> u8 {
        self.0[2]
    }

    pub const fn alpha(self) -> u8 {
        self.0[3]
    }

    /// Scale alpha channel by `coverage` in `[0, 255]`
    pub fn with_coverage(self, coverage: u8) -> Self {
        let Self([r, g, b, a]) = self;
        Self([r, g, b, mul_u8(a, coverage)])
    }

    /// Blend other color on top of this color (source-over)
    pub fn blend_over(self, other: Self) -> Self {
        let src_a = other.alpha() as f32 / 255.0;
        if src_a <= 0.0 {
            return self;
        }
        let dst_a = self.alpha() as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        let channel = |src: u8, dst: u8| {
            let value =
                (src as f32 * src_a + dst as f32 * dst_a * (1.0 - src_a)) / out_a.max(f32::EPSILON);
            value.round().clamp(0.0, 255.0) as u8
        };
        Self([
            channel(other.red(), self.red()),
            channel(other.green(), self.green()),
            channel(other.blue(), self.blue()),
            (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        ])
    }
}

#[inline]
fn mul_u8(a: u8, b: u8) -> u8 {
    let value = a as u32 * b as u32 + 128;
    ((value + (value >> 8)) >> 8) as u8
}

impl fmt::Debug for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

impl fmt::Display for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error returned when color string can not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorError(pub String);

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color: {:?}", self.0)
    }
}

impl std::error::Error for ColorError {}

impl FromStr for Rgba8 {
    type Err = ColorError;

    /// Parse `#rrggbb` or `#rrggbbaa`
    fn from_str(color: &str) -> Result<Self, Self::Err> {
        let error = || ColorError(color.to_owned());
        let hex = color.trim().strip_prefix('#').ok_or_else(error)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(error());
        }
        let channel = |index: usize| {
            hex.get(index * 2..index * 2 + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(error)
        };
        let alpha = if hex.len() == 8 { channel(3)? } else { 255 };
        Ok(Self([channel(0)?, channel(1)?, channel(2)?, alpha]))
    }
}

impl Serialize for Rgba8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let color = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        color.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() -> Result<(), ColorError> {
        assert_eq!("#112233".parse::<Rgba8>()?, Rgba8::new(0x11, 0x22, 0x33, 0xff));
        assert_eq!("#11182740".parse::<Rgba8>()?, Rgba8::new(17, 24, 39, 64));
        assert!("112233".parse::<Rgba8>().is_err());
        assert!("#1122".parse::<Rgba8>().is_err());
        assert!("#gg2233".parse::<Rgba8>().is_err());
        assert_eq!(format!("{}", Rgba8::new(1, 2, 3, 4)), "#01020304");
        Ok(())
    }

    #[test]
    fn test_blend() {
        let bg = Rgba8::WHITE;
        assert_eq!(bg.blend_over(Rgba8::TRANSPARENT), bg);
        assert_eq!(bg.blend_over(Rgba8::BLACK), Rgba8::BLACK);
        let half = bg.blend_over(Rgba8::new(0, 0, 0, 128));
        assert_eq!(half.alpha(), 255);
        assert!((126..=128).contains(&half.red()));
        assert_eq!(Rgba8::BLACK.with_coverage(255), Rgba8::BLACK);
        assert_eq!(Rgba8::BLACK.with_coverage(0).alpha(), 0);
    }

    #[test]
    fn test_serde() -> Result<(), serde_json::Error> {
        let color: Rgba8 = serde_json::from_str("\"#ef4444d1\"")?;
        assert_eq!(color, Rgba8::new(0xef, 0x44, 0x44, 0xd1));
        assert_eq!(serde_json::to_string(&color)?, "\"#ef4444d1\"");
        Ok(())
    }
}
