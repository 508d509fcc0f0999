//! Guide configuration and construction of the required mask
use crate::{
    BitMask, DEFAULT_FLATNESS, DEFAULT_SAMPLE_STEP, GlyphSet, ImageMut, ImageOwned, Point,
    Polyline, Rgba8, Scalar, Size, render, utils::round_to_usize,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixels with alpha above this value belong to the guide
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 16;
pub const DEFAULT_THRESHOLD: Scalar = 0.7;
pub const DEFAULT_GRACE_MS: u64 = 120;
// smallest dilation radius derived from the stroke width
const MIN_NEIGHBOR_RADIUS: u32 = 3;

/// What happens when coverage reaches the completion threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Attempt finishes by itself after a short grace delay
    AutoFinish {
        #[serde(default = "default_grace_ms")]
        grace_ms: u64,
    },
    /// Reaching the threshold only enables the confirm action
    Confirm,
}

fn default_grace_ms() -> u64 {
    DEFAULT_GRACE_MS
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self::AutoFinish {
            grace_ms: DEFAULT_GRACE_MS,
        }
    }
}

/// Immutable description of the guide and tracing tolerances
///
/// Optional values are derived from the font size (or the guide stroke width)
/// when not set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideSpec {
    /// Text to trace
    pub text: String,
    /// Raster width in pixels
    pub width: usize,
    /// Raster height in pixels
    pub height: usize,
    /// Family of the glyph set expected to render the text
    pub font_family: String,
    pub font_size: Option<Scalar>,
    pub guide_stroke_width: Option<Scalar>,
    pub user_stroke_width: Option<Scalar>,
    /// Dilation radius around sampled gesture points
    pub neighbor_radius: Option<u32>,
    /// Coverage ratio in `[0, 1]` required for completion
    pub threshold: Scalar,
    pub policy: CompletionPolicy,
    /// Distance between resampled points of a gesture segment
    pub sample_step: Scalar,
    pub alpha_threshold: u8,
    /// How long to wait for glyphs before falling back, waits forever if unset
    pub font_timeout_ms: Option<u64>,
    pub background: Rgba8,
    pub guide_color: Rgba8,
    pub user_stroke_color: Rgba8,
}

impl Default for GuideSpec {
    fn default() -> Self {
        Self {
            text: "RAM".to_owned(),
            width: 480,
            height: 240,
            font_family: "builtin-stroke".to_owned(),
            font_size: None,
            guide_stroke_width: None,
            user_stroke_width: None,
            neighbor_radius: None,
            threshold: DEFAULT_THRESHOLD,
            policy: CompletionPolicy::default(),
            sample_step: DEFAULT_SAMPLE_STEP,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            font_timeout_ms: None,
            background: Rgba8::new(255, 255, 255, 230),
            guide_color: Rgba8::new(17, 24, 39, 64),
            user_stroke_color: Rgba8::new(239, 68, 68, 209),
        }
    }
}

impl GuideSpec {
    /// Parse guide specification from JSON, missing fields take default values
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self
        }
    }

    pub fn with_size(self, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }

    pub fn with_font_size(self, font_size: Scalar) -> Self {
        Self {
            font_size: Some(font_size),
            ..self
        }
    }

    pub fn with_guide_stroke_width(self, width: Scalar) -> Self {
        Self {
            guide_stroke_width: Some(width),
            ..self
        }
    }

    pub fn with_neighbor_radius(self, radius: u32) -> Self {
        Self {
            neighbor_radius: Some(radius),
            ..self
        }
    }

    pub fn with_threshold(self, threshold: Scalar) -> Self {
        Self { threshold, ..self }
    }

    pub fn with_policy(self, policy: CompletionPolicy) -> Self {
        Self { policy, ..self }
    }

    pub fn with_font_timeout(self, timeout: Duration) -> Self {
        Self {
            font_timeout_ms: Some(timeout.as_millis() as u64),
            ..self
        }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn font_size(&self) -> Scalar {
        self.font_size
            .unwrap_or_else(|| (self.height as Scalar * 0.75).min(200.0))
    }

    pub fn guide_stroke_width(&self) -> Scalar {
        self.guide_stroke_width
            .unwrap_or_else(|| (self.font_size() * 0.12).round())
    }

    pub fn user_stroke_width(&self) -> Scalar {
        self.user_stroke_width
            .unwrap_or_else(|| (self.font_size() * 0.07).round().max(4.0))
    }

    pub fn neighbor_radius(&self) -> u32 {
        self.neighbor_radius.unwrap_or_else(|| {
            (round_to_usize(self.guide_stroke_width() * 0.6) as u32).max(MIN_NEIGHBOR_RADIUS)
        })
    }

    /// Completion threshold restricted to `[0, 1]`
    pub fn threshold(&self) -> Scalar {
        if self.threshold.is_nan() {
            DEFAULT_THRESHOLD
        } else {
            self.threshold.clamp(0.0, 1.0)
        }
    }

    pub fn font_timeout(&self) -> Option<Duration> {
        self.font_timeout_ms.map(Duration::from_millis)
    }

    /// Point on which rendered text is centered
    pub fn anchor(&self) -> Point {
        Point::new(
            self.width as Scalar / 2.0,
            self.height as Scalar / 2.0 + self.font_size() * 0.05,
        )
    }
}

/// Rendered guide and the mask of pixels the user has to cover
#[derive(Debug, Clone)]
pub struct Guide {
    required: BitMask,
    surface: ImageOwned<Rgba8>,
    outline: Vec<Polyline>,
}

impl Guide {
    /// Guide without any required pixels
    pub fn empty(size: Size) -> Self {
        Self {
            required: BitMask::new(size),
            surface: ImageOwned::new_default(size),
            outline: Vec::new(),
        }
    }

    /// Mask of required pixels
    pub fn required(&self) -> &BitMask {
        &self.required
    }

    /// Number of required pixels, denominator of the coverage ratio
    pub fn required_count(&self) -> usize {
        self.required.count()
    }

    /// Visible guide, translucent outline over the card background
    pub fn surface(&self) -> &ImageOwned<Rgba8> {
        &self.surface
    }

    /// Stroked centerlines in raster coordinates
    pub fn outline(&self) -> &[Polyline] {
        &self.outline
    }

    pub fn size(&self) -> Size {
        self.required.size()
    }
}

/// Render text of the guide as a stroked outline and derive the required mask
pub fn prepare_guide(spec: &GuideSpec, glyphs: &GlyphSet) -> Guide {
    let _span = tracing::debug_span!("[prepare_guide]", text = %spec.text, family = glyphs.family())
        .entered();
    if glyphs.family() != spec.font_family {
        tracing::debug!(
            expected = %spec.font_family,
            actual = glyphs.family(),
            "rendering guide with a different glyph set"
        );
    }
    let size = spec.size();
    let path = glyphs.layout(&spec.text, spec.font_size(), spec.anchor());
    let outline = path.flatten(Default::default(), DEFAULT_FLATNESS);

    let alpha = render::stroke_alpha(&outline, spec.guide_stroke_width(), size);
    let required = BitMask::from_alpha(&alpha, spec.alpha_threshold);
    if required.is_empty() {
        tracing::warn!(text = %spec.text, "guide has no required pixels, completion is disabled");
    }

    let mut surface = ImageOwned::new_default(size);
    surface.fill(spec.background);
    render::composite(&mut surface, &alpha, spec.guide_color);

    tracing::debug!(required = required.count(), "guide prepared");
    Guide {
        required,
        surface,
        outline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Image, assert_approx_eq};

    #[test]
    fn test_derived_defaults() {
        let spec = GuideSpec::default();
        assert_approx_eq!(spec.font_size(), 180.0);
        assert_approx_eq!(spec.guide_stroke_width(), 22.0);
        assert_approx_eq!(spec.user_stroke_width(), 13.0);
        assert_eq!(spec.neighbor_radius(), 13);

        let spec = spec.with_guide_stroke_width(24.0);
        assert_eq!(spec.neighbor_radius(), 14);
        let spec = spec.with_guide_stroke_width(2.0);
        assert_eq!(spec.neighbor_radius(), MIN_NEIGHBOR_RADIUS);
        let spec = spec.with_neighbor_radius(1);
        assert_eq!(spec.neighbor_radius(), 1);

        assert_approx_eq!(spec.clone().with_threshold(1.5).threshold(), 1.0);
        assert_approx_eq!(spec.clone().with_threshold(Scalar::NAN).threshold(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_from_json() -> Result<(), serde_json::Error> {
        let spec = GuideSpec::from_json(
            r##"{"text": "OM", "width": 320, "threshold": 0.9,
                "policy": {"mode": "confirm"}, "guide_color": "#00000080"}"##,
        )?;
        assert_eq!(spec.text, "OM");
        assert_eq!(spec.size(), Size { width: 320, height: 240 });
        assert_eq!(spec.policy, CompletionPolicy::Confirm);
        assert_eq!(spec.guide_color, Rgba8::new(0, 0, 0, 128));
        assert_eq!(spec.alpha_threshold, DEFAULT_ALPHA_THRESHOLD);

        let spec = GuideSpec::from_json(r#"{"policy": {"mode": "auto_finish"}}"#)?;
        assert_eq!(spec.policy, CompletionPolicy::default());
        Ok(())
    }

    #[test]
    fn test_prepare_guide() {
        let spec = GuideSpec::default().with_text("L");
        let guide = prepare_guide(&spec, GlyphSet::builtin());
        assert!(guide.required_count() > 0);
        assert_eq!(guide.required().popcount(), guide.required_count());
        assert_eq!(guide.outline().len(), 1);
        // corner of the raster is far from the glyph
        assert!(!guide.required().contains_xy(0, 0));
        assert_eq!(guide.surface().get(0, 0), Some(&spec.background));
        // outline points are required and tinted
        let Point([x, y]) = guide.outline()[0].points[1];
        assert!(guide.required().contains_xy(x as i64, y as i64));
        assert_ne!(
            guide.surface().get(y as usize, x as usize),
            Some(&spec.background)
        );
    }

    #[test]
    fn test_prepare_degenerate() {
        let spec = GuideSpec::default().with_text("~~");
        let guide = prepare_guide(&spec, GlyphSet::builtin());
        assert_eq!(guide.required_count(), 0);
        assert!(guide.outline().is_empty());
    }
}
