//! Glyph outlines and text layout
//!
//! Glyphs are described by outline path data in font units with the `y` axis
//! pointing up and the baseline at zero, the same way font files do it.
use crate::{Path, Point, Scalar, SvgParserError, Transform};
use serde::Deserialize;
use std::{collections::HashMap, fmt, sync::OnceLock};

const BUILTIN_FAMILY: &str = "builtin-stroke";
const BUILTIN_GLYPHS: &str = include_str!("glyphs.txt");

/// Single glyph of a glyph set
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Horizontal advance in font units
    pub advance: Scalar,
    /// Outline in font units
    pub outline: Path,
}

/// Collection of glyphs sharing metrics, plays the role of a font
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphSet {
    family: String,
    units_per_em: Scalar,
    ascent: Scalar,
    descent: Scalar,
    glyphs: HashMap<char, Glyph>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlyphSetDesc {
    family: String,
    #[serde(default = "default_units_per_em")]
    units_per_em: Scalar,
    #[serde(default = "default_ascent")]
    ascent: Scalar,
    #[serde(default = "default_descent")]
    descent: Scalar,
    glyphs: HashMap<String, GlyphDesc>,
}

#[derive(Deserialize)]
struct GlyphDesc {
    advance: Scalar,
    #[serde(default)]
    path: String,
}

fn default_units_per_em() -> Scalar {
    1000.0
}

fn default_ascent() -> Scalar {
    800.0
}

fn default_descent() -> Scalar {
    -200.0
}

impl GlyphSet {
    /// Create empty glyph set with provided metrics
    pub fn new(
        family: impl Into<String>,
        units_per_em: Scalar,
        ascent: Scalar,
        descent: Scalar,
    ) -> Self {
        Self {
            family: family.into(),
            units_per_em: if units_per_em > 0.0 { units_per_em } else { 1000.0 },
            ascent,
            descent,
            glyphs: HashMap::new(),
        }
    }

    /// Glyph set compiled into the library (single stroke digits and capital latin letters)
    pub fn builtin() -> &'static GlyphSet {
        static BUILTIN: OnceLock<GlyphSet> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let mut glyphs = GlyphSet::new(BUILTIN_FAMILY, 1000.0, 800.0, -200.0);
            glyphs
                .extend_from_lines(BUILTIN_GLYPHS)
                .expect("builtin glyph data is valid");
            glyphs
        })
    }

    /// Load glyph set from JSON description
    ///
    /// ```json
    /// {"family": "Trace", "unitsPerEm": 1000, "ascent": 800, "descent": -200,
    ///  "glyphs": {"L": {"advance": 540, "path": "M100 700 L100 0 L500 0"}}}
    /// ```
    pub fn from_json(json: &str) -> Result<Self, GlyphError> {
        let desc: GlyphSetDesc = serde_json::from_str(json)?;
        let mut glyphs = GlyphSet::new(desc.family, desc.units_per_em, desc.ascent, desc.descent);
        for (key, glyph) in desc.glyphs {
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return Err(GlyphError::InvalidKey(key));
            };
            let outline =
                Path::from_svg(&glyph.path).map_err(|error| GlyphError::Path { ch, error })?;
            glyphs.insert(ch, glyph.advance, outline);
        }
        Ok(glyphs)
    }

    /// Load glyph set from JSON file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, GlyphError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse lines in the `U+XXXX <advance> [path data]` format, `#` starts a comment
    pub fn extend_from_lines(&mut self, text: &str) -> Result<(), GlyphError> {
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = || GlyphError::InvalidLine(index + 1);
            let mut fields = line.splitn(3, char::is_whitespace);
            let ch = fields
                .next()
                .and_then(|code| code.strip_prefix("U+"))
                .and_then(|code| u32::from_str_radix(code, 16).ok())
                .and_then(char::from_u32)
                .ok_or_else(invalid)?;
            let advance: Scalar = fields
                .next()
                .and_then(|advance| advance.parse().ok())
                .ok_or_else(invalid)?;
            let outline = Path::from_svg(fields.next().unwrap_or("").trim())
                .map_err(|error| GlyphError::Path { ch, error })?;
            self.insert(ch, advance, outline);
        }
        Ok(())
    }

    /// Add or replace glyph
    pub fn insert(&mut self, ch: char, advance: Scalar, outline: Path) {
        self.glyphs.insert(ch, Glyph { advance, outline });
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn units_per_em(&self) -> Scalar {
        self.units_per_em
    }

    pub fn get(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&ch)
    }

    pub fn contains(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    // advance used for characters without a glyph
    fn missing_advance(&self) -> Scalar {
        self.get(' ')
            .map(|glyph| glyph.advance)
            .unwrap_or(self.units_per_em / 4.0)
    }

    /// Total advance of the text in font units
    pub fn text_advance(&self, text: &str) -> Scalar {
        text.chars()
            .map(|ch| self.get(ch).map_or_else(|| self.missing_advance(), |g| g.advance))
            .sum()
    }

    /// Layout text as a single path in raster coordinates
    ///
    /// Text is centered horizontally on `anchor` and the middle of the em box
    /// is placed on `anchor.y`. Characters without a glyph are skipped.
    pub fn layout(&self, text: &str, font_size: Scalar, anchor: Point) -> Path {
        let scale = font_size / self.units_per_em;
        let mut pen = anchor.x() - self.text_advance(text) * scale / 2.0;
        let baseline = anchor.y() + (self.ascent + self.descent) / 2.0 * scale;
        let mut path = Path::empty();
        for ch in text.chars() {
            match self.get(ch) {
                Some(glyph) => {
                    let tr = Transform::identity()
                        .translate(pen, baseline)
                        .scale(scale, -scale);
                    path.extend(glyph.outline.transform(tr));
                    pen += glyph.advance * scale;
                }
                None => {
                    tracing::debug!(?ch, family = %self.family, "missing glyph");
                    pen += self.missing_advance() * scale;
                }
            }
        }
        path
    }
}

/// Readiness of the glyph set used to render the guide
#[derive(Debug, Clone, Default)]
pub enum FontState {
    /// Glyph set is still being loaded
    #[default]
    Loading,
    Ready(GlyphSet),
    /// Loading failed, rendering falls back to the builtin glyph set
    Failed,
}

impl FontState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FontState::Loading)
    }

    /// Glyph set to render with, `None` while loading
    pub fn glyphs(&self) -> Option<&GlyphSet> {
        match self {
            FontState::Loading => None,
            FontState::Ready(glyphs) => Some(glyphs),
            FontState::Failed => Some(GlyphSet::builtin()),
        }
    }
}

impl From<Result<GlyphSet, GlyphError>> for FontState {
    fn from(result: Result<GlyphSet, GlyphError>) -> Self {
        match result {
            Ok(glyphs) => FontState::Ready(glyphs),
            Err(error) => {
                tracing::warn!(%error, "failed to load glyphs, using builtin fallback");
                FontState::Failed
            }
        }
    }
}

/// Error while loading glyph set
#[derive(Debug)]
pub enum GlyphError {
    /// Glyph outline is not valid path data
    Path { ch: char, error: SvgParserError },
    /// Glyph key is not a single character
    InvalidKey(String),
    /// Malformed line in the line based format
    InvalidLine(usize),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for GlyphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path { ch, error } => write!(f, "glyph {:?}: {}", ch, error),
            Self::InvalidKey(key) => write!(f, "glyph key must be a single character: {:?}", key),
            Self::InvalidLine(line) => write!(f, "malformed glyph at line {}", line),
            Self::Json(error) => write!(f, "invalid glyph set: {}", error),
            Self::Io(error) => write!(f, "failed to read glyph set: {}", error),
        }
    }
}

impl std::error::Error for GlyphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Path { error, .. } => Some(error),
            Self::Json(error) => Some(error),
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GlyphError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

impl From<std::io::Error> for GlyphError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_FLATNESS, assert_approx_eq};

    #[test]
    fn test_builtin() {
        let glyphs = GlyphSet::builtin();
        assert_eq!(glyphs.family(), BUILTIN_FAMILY);
        assert_eq!(glyphs.len(), 37);
        for ch in ('A'..='Z').chain('0'..='9') {
            let glyph = glyphs.get(ch).expect("builtin glyph");
            assert!(!glyph.outline.is_empty(), "{:?} has no outline", ch);
        }
        assert!(glyphs.get(' ').expect("space").outline.is_empty());
    }

    #[test]
    fn test_from_json() -> Result<(), GlyphError> {
        let glyphs = GlyphSet::from_json(
            r#"{"family": "Trace", "unitsPerEm": 500, "glyphs": {
                "L": {"advance": 270, "path": "M50 350 L50 0 L250 0"},
                " ": {"advance": 150}}}"#,
        )?;
        assert_eq!(glyphs.family(), "Trace");
        assert_approx_eq!(glyphs.units_per_em(), 500.0);
        assert_eq!(glyphs.len(), 2);
        assert_approx_eq!(glyphs.text_advance("L L"), 690.0);
        // unknown characters advance like a space
        assert_approx_eq!(glyphs.text_advance("LX"), 420.0);

        let error = GlyphSet::from_json(r#"{"family": "x", "glyphs": {"ab": {"advance": 1}}}"#);
        assert!(matches!(error, Err(GlyphError::InvalidKey(_))));
        let json = r#"{"family": "x", "glyphs": {"a": {"advance": 1, "path": "L1 1"}}}"#;
        let error = GlyphSet::from_json(json);
        assert!(matches!(error, Err(GlyphError::Path { ch: 'a', .. })));
        assert!(matches!(GlyphSet::from_json("{"), Err(GlyphError::Json(_))));
        Ok(())
    }

    #[test]
    fn test_from_file() {
        let name = format!("tracemask-glyphs-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        let missing = GlyphSet::from_file(&path);
        assert!(matches!(missing, Err(GlyphError::Io(_))));

        std::fs::write(&path, r#"{"family": "File", "glyphs": {"I": {"advance": 300}}}"#)
            .expect("write glyph set");
        let glyphs = GlyphSet::from_file(&path);
        std::fs::remove_file(&path).expect("remove glyph set");
        let glyphs = glyphs.expect("glyph set loads");
        assert_eq!(glyphs.family(), "File");
        assert_eq!(glyphs.len(), 1);
    }

    #[test]
    fn test_invalid_lines() {
        let mut glyphs = GlyphSet::new("x", 1000.0, 800.0, -200.0);
        assert!(matches!(
            glyphs.extend_from_lines("# comment\nA 100 M0 0 L1 1"),
            Err(GlyphError::InvalidLine(2))
        ));
        assert!(matches!(
            glyphs.extend_from_lines("U+0041 wide M0 0"),
            Err(GlyphError::InvalidLine(1))
        ));
    }

    #[test]
    fn test_layout_centered() -> Result<(), GlyphError> {
        let glyphs = GlyphSet::from_json(
            r#"{"family": "Box", "glyphs": {"I": {"advance": 200, "path": "M100 0 L100 600"}}}"#,
        )?;
        let path = glyphs.layout("II", 100.0, Point::new(240.0, 120.0));
        let bbox = path
            .bbox(Transform::identity())
            .expect("non empty layout");
        // advance 2 * 200 units = 40px, stems at 10px and 30px from the start
        assert_approx_eq!(bbox.min().x(), 230.0, 1e-9);
        assert_approx_eq!(bbox.max().x(), 250.0, 1e-9);
        // baseline is 300 units (30px) below the em middle, stem goes 60px up
        assert_approx_eq!(bbox.max().y(), 150.0, 1e-9);
        assert_approx_eq!(bbox.min().y(), 90.0, 1e-9);
        let lines = path.flatten(Transform::identity(), DEFAULT_FLATNESS);
        assert_eq!(lines.len(), 2);
        Ok(())
    }

    #[test]
    fn test_font_state() {
        assert!(FontState::default().is_loading());
        assert!(FontState::Loading.glyphs().is_none());
        let failed = FontState::from(Err(GlyphError::InvalidLine(1)));
        assert_eq!(
            failed.glyphs().map(GlyphSet::family),
            Some(BUILTIN_FAMILY)
        );
    }
}
