//! Glyph tracing validator
//!
//! Renders text as a stroked guide, derives the mask of pixels the user has to
//! cover, accumulates pointer gestures into a coverage mask and resolves trace
//! attempts with a pass/fail outcome and the coverage ratio.
//!
//! Main features:
//!  - SVG path parsing and curve flattening
//!  - Anti-aliased stroke rendering of guides and user strokes
//!  - Idempotent coverage accumulation with dense segment sampling
//!  - Single-threaded attempt state machine driven by host events
//!
#![deny(warnings)]

mod color;
mod coverage;
mod engine;
mod geometry;
mod glyph;
mod guide;
mod image;
mod input;
mod mask;
mod path;
mod render;
mod score;
mod session;
mod store;
mod svg;
mod utils;
mod writer;

pub use color::{ColorError, Rgba8};
pub use coverage::{Coverage, DEFAULT_SAMPLE_STEP, GestureState};
pub use engine::{
    Attempt, AttemptOutcome, AttemptResult, Dismissed, EngineState, Frame, TraceEngine,
};
pub use geometry::{BBox, EPSILON, Line, Point, Scalar, Size, Transform, scalar_fmt};
pub use glyph::{FontState, Glyph, GlyphError, GlyphSet};
pub use guide::{
    CompletionPolicy, DEFAULT_ALPHA_THRESHOLD, DEFAULT_GRACE_MS, DEFAULT_THRESHOLD, Guide,
    GuideSpec, prepare_guide,
};
pub use image::{Image, ImageMut, ImageOwned, Shape};
pub use input::{InputSource, Key, Listeners, NoInput, PointerEvent, Viewport};
pub use mask::BitMask;
pub use path::{DEFAULT_FLATNESS, Path, PathBuilder, Polyline, Segment, SubPath};
#[cfg(feature = "png")]
pub use render::write_png;
pub use render::{composite, draw_polyline, stroke_alpha, stroke_polyline};
pub use score::{SCORES_KEY, ScoreBoard, Scores};
pub use session::{CURRENT_SESSION_KEY, Clock, KvSessionStore, SESSIONS_KEY, Session, SessionStore};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError, load_json, save_json};
pub use svg::{SvgParserError, SvgPathCmd, SvgPathParser};
pub use writer::{WriteController, WriteEvent};
