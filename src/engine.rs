//! Trace attempt state machine
//!
//! [`TraceEngine`] owns the guide, the coverage accumulator and the gesture of
//! a single attempt. Everything is driven by the host on one thread: pointer
//! and key events, glyph loading results and the passage of time (`advance`).
//! The pending attempt is exposed as an [`Attempt`], a single-shot future that
//! resolves once with either an [`AttemptOutcome`] or [`Dismissed`].
use crate::{
    CompletionPolicy, Coverage, FontState, GestureState, GlyphError, GlyphSet, Guide, GuideSpec,
    ImageOwned, InputSource, Key, Listeners, PointerEvent, Polyline, Rgba8, Scalar, Viewport,
    prepare_guide, render,
};
use std::{
    cell::RefCell,
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
    time::Duration,
};

/// Result of a resolved attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptOutcome {
    /// Coverage ratio in `[0, 1]` at the moment of resolution
    pub ratio: Scalar,
    /// Whether the ratio reached the completion threshold
    pub completed: bool,
}

impl AttemptOutcome {
    /// Score in percent as reported to the score board
    pub fn score(&self) -> Scalar {
        self.ratio * 100.0
    }
}

/// Attempt was dismissed by the user before it was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dismissed;

impl fmt::Display for Dismissed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace attempt dismissed")
    }
}

impl std::error::Error for Dismissed {}

pub type AttemptResult = Result<AttemptOutcome, Dismissed>;

#[derive(Debug, Default)]
struct AttemptSlot {
    result: Option<AttemptResult>,
    wakers: Vec<Waker>,
}

/// Handle to a pending trace attempt
///
/// Clones share the same slot, and all of them observe the single resolution.
#[derive(Debug, Clone, Default)]
pub struct Attempt {
    slot: Rc<RefCell<AttemptSlot>>,
}

impl PartialEq for Attempt {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for Attempt {}

impl Attempt {
    fn new() -> Self {
        Self::default()
    }

    /// Store result and wake waiters, only the first resolution takes effect
    fn resolve(&self, result: AttemptResult) -> bool {
        let wakers = {
            let mut slot = self.slot.borrow_mut();
            if slot.result.is_some() {
                return false;
            }
            slot.result = Some(result);
            std::mem::take(&mut slot.wakers)
        };
        wakers.into_iter().for_each(Waker::wake);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.slot.borrow().result.is_none()
    }

    /// Result of the attempt if it was resolved
    pub fn result(&self) -> Option<AttemptResult> {
        self.slot.borrow().result
    }
}

impl Future for Attempt {
    type Output = AttemptResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.result {
            Some(result) => Poll::Ready(result),
            None => {
                if !slot.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    slot.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Observable state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    /// No attempt is pending
    #[default]
    Idle,
    /// Attempt is pending, waiting for glyphs to build the guide
    Preparing,
    /// Guide is ready, no stroke in progress
    AwaitingGesture,
    /// Stroke is in progress
    Drawing,
}

/// Declarative snapshot of everything the presentation layer has to show
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// Whether the overlay is shown
    pub visible: bool,
    pub state: EngineState,
    pub ratio: Scalar,
    /// Rounded progress in percent
    pub percent: u32,
    /// Whether the confirm action is available
    pub confirm_enabled: bool,
    /// Incremented every time the guide is rebuilt
    pub guide_revision: u64,
    pub guide: &'a ImageOwned<Rgba8>,
    /// User strokes of the current attempt in raster coordinates
    pub strokes: &'a [Polyline],
    pub stroke_width: Scalar,
    pub stroke_color: Rgba8,
}

impl Frame<'_> {
    /// Rasterize user strokes over the guide
    pub fn render(&self) -> ImageOwned<Rgba8> {
        let mut surface = self.guide.clone();
        for stroke in self.strokes {
            render::draw_polyline(&mut surface, stroke, self.stroke_width, self.stroke_color);
        }
        surface
    }
}

/// Engine validating that the user traced the guide
pub struct TraceEngine {
    spec: GuideSpec,
    font: FontState,
    guide: Guide,
    guide_revision: u64,
    coverage: Coverage,
    gesture: GestureState,
    strokes: Vec<Polyline>,
    state: EngineState,
    attempt: Option<Attempt>,
    // threshold was reached during the current attempt
    completed: bool,
    // time left until auto finish
    finish_in: Option<Duration>,
    font_wait: Duration,
    viewport: Viewport,
    listeners: Listeners,
}

impl fmt::Debug for TraceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEngine")
            .field("text", &self.spec.text)
            .field("state", &self.state)
            .field("required", &self.guide.required_count())
            .field("covered", &self.coverage.count())
            .field("completed", &self.completed)
            .finish()
    }
}

impl TraceEngine {
    /// Create engine rendering with the builtin glyph set
    pub fn configure(spec: GuideSpec) -> Self {
        Self::new(spec, FontState::Ready(GlyphSet::builtin().clone()))
    }

    /// Create engine with the glyph set in the given loading state
    pub fn new(spec: GuideSpec, font: FontState) -> Self {
        let size = spec.size();
        let coverage = Coverage::new(size, spec.neighbor_radius(), spec.sample_step);
        Self {
            guide: Guide::empty(size),
            guide_revision: 0,
            coverage,
            gesture: GestureState::default(),
            strokes: Vec::new(),
            state: EngineState::Idle,
            attempt: None,
            completed: false,
            finish_in: None,
            font_wait: Duration::ZERO,
            viewport: Viewport::identity(size),
            listeners: Listeners::default(),
            spec,
            font,
        }
    }

    /// Use input source that is attached while an attempt is pending
    pub fn with_input(mut self, source: Box<dyn InputSource>) -> Self {
        self.listeners.detach();
        self.listeners = Listeners::new(source);
        if self.attempt.is_some() {
            self.listeners.attach();
        }
        self
    }

    /// Set placement of the raster on the display
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn spec(&self) -> &GuideSpec {
        &self.spec
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn guide(&self) -> &Guide {
        &self.guide
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// Whether an attempt is pending
    pub fn is_active(&self) -> bool {
        self.attempt.is_some()
    }

    /// Current coverage ratio in `[0, 1]`
    pub fn ratio(&self) -> Scalar {
        self.coverage.ratio(self.guide.required())
    }

    pub fn percent(&self) -> u32 {
        (self.ratio() * 100.0).round() as u32
    }

    /// Whether coverage reached the threshold of a non-degenerate guide
    pub fn threshold_reached(&self) -> bool {
        self.guide.required_count() > 0 && self.ratio() >= self.spec.threshold()
    }

    /// Begin an attempt, or return the pending one
    pub fn start(&mut self) -> Attempt {
        if let Some(attempt) = &self.attempt {
            tracing::debug!("start while pending, joining current attempt");
            return attempt.clone();
        }
        let attempt = Attempt::new();
        self.attempt = Some(attempt.clone());
        self.listeners.attach();
        self.font_wait = Duration::ZERO;
        self.set_state(EngineState::Preparing);
        self.try_prepare();
        attempt
    }

    /// Deliver result of the asynchronous glyph loading
    pub fn font_loaded(&mut self, result: Result<GlyphSet, GlyphError>) {
        self.font = FontState::from(result);
        self.try_prepare();
    }

    /// Elapse host clock, drives font timeout and auto finish delay
    pub fn advance(&mut self, dt: Duration) {
        if self.state == EngineState::Preparing && self.font.is_loading() {
            if let Some(timeout) = self.spec.font_timeout() {
                self.font_wait += dt;
                if self.font_wait >= timeout {
                    tracing::warn!(?timeout, "glyphs are not ready, using builtin fallback");
                    self.font = FontState::Failed;
                    self.try_prepare();
                }
            }
        }
        if let Some(remaining) = self.finish_in {
            match remaining.checked_sub(dt) {
                Some(remaining) if !remaining.is_zero() => self.finish_in = Some(remaining),
                _ => self.force_finish(true),
            }
        }
    }

    /// Resolve pending attempt, with the current ratio if `accept` or as dismissed
    pub fn force_finish(&mut self, accept: bool) {
        let result = if accept {
            Ok(AttemptOutcome {
                ratio: self.ratio(),
                completed: self.threshold_reached(),
            })
        } else {
            Err(Dismissed)
        };
        self.finish(result);
    }

    pub fn pointer_down(&mut self, event: PointerEvent) {
        if self.finish_in.is_some() {
            return;
        }
        // repeated down of the owning pointer (its up was lost) restarts the stroke
        let restart = self.state == EngineState::Drawing && self.gesture.owns(event.pointer_id);
        if self.state != EngineState::AwaitingGesture && !restart {
            return;
        }
        let point = self.viewport.to_raster(event.position);
        self.gesture.begin(event.pointer_id, point);
        self.strokes.push(Polyline {
            points: vec![point],
            closed: false,
        });
        self.set_state(EngineState::Drawing);
        self.coverage.sample_segment(self.guide.required(), None, point);
        self.update_progress();
    }

    pub fn pointer_move(&mut self, event: PointerEvent) {
        if self.state != EngineState::Drawing || !self.gesture.owns(event.pointer_id) {
            return;
        }
        let point = self.viewport.to_raster(event.position);
        let last = self.gesture.last_point;
        self.coverage.sample_segment(self.guide.required(), last, point);
        self.gesture.last_point = Some(point);
        if let Some(stroke) = self.strokes.last_mut() {
            stroke.points.push(point);
        }
        self.update_progress();
    }

    pub fn pointer_up(&mut self, event: PointerEvent) {
        self.end_stroke(event.pointer_id);
    }

    pub fn pointer_cancel(&mut self, pointer_id: u32) {
        self.end_stroke(pointer_id);
    }

    /// Stroke ends early, accumulated coverage is kept
    pub fn pointer_capture_lost(&mut self, pointer_id: u32) {
        if self.gesture.owns(pointer_id) {
            tracing::debug!(pointer_id, "pointer capture lost");
        }
        self.end_stroke(pointer_id);
    }

    pub fn key_down(&mut self, key: Key) {
        if !self.is_active() {
            return;
        }
        match key {
            Key::Escape => self.force_finish(false),
            Key::Enter if self.confirm_enabled() => self.force_finish(true),
            _ => {}
        }
    }

    /// Snapshot of the state for the presentation layer
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            visible: self.is_active(),
            state: self.state,
            ratio: self.ratio(),
            percent: self.percent(),
            confirm_enabled: self.confirm_enabled(),
            guide_revision: self.guide_revision,
            guide: self.guide.surface(),
            strokes: &self.strokes,
            stroke_width: self.spec.user_stroke_width(),
            stroke_color: self.spec.user_stroke_color,
        }
    }

    fn confirm_enabled(&self) -> bool {
        self.spec.policy == CompletionPolicy::Confirm && self.completed
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "engine state");
            self.state = state;
        }
    }

    fn try_prepare(&mut self) {
        if self.state != EngineState::Preparing {
            return;
        }
        let Some(glyphs) = self.font.glyphs() else {
            return;
        };
        self.guide = prepare_guide(&self.spec, glyphs);
        self.guide_revision += 1;
        self.coverage.reset();
        self.gesture.end();
        self.strokes.clear();
        self.completed = false;
        self.finish_in = None;
        self.set_state(EngineState::AwaitingGesture);
    }

    fn end_stroke(&mut self, pointer_id: u32) {
        if self.state != EngineState::Drawing || !self.gesture.owns(pointer_id) {
            return;
        }
        self.gesture.end();
        self.set_state(EngineState::AwaitingGesture);
    }

    fn update_progress(&mut self) {
        if self.completed || !self.threshold_reached() {
            return;
        }
        self.completed = true;
        tracing::debug!(ratio = self.ratio(), "completion threshold reached");
        if let CompletionPolicy::AutoFinish { grace_ms } = self.spec.policy {
            if grace_ms == 0 {
                self.force_finish(true);
            } else {
                self.finish_in = Some(Duration::from_millis(grace_ms));
            }
        }
    }

    fn finish(&mut self, result: AttemptResult) {
        let Some(attempt) = self.attempt.take() else {
            return;
        };
        self.listeners.detach();
        self.gesture.end();
        self.finish_in = None;
        self.set_state(EngineState::Idle);
        match &result {
            Ok(outcome) => tracing::info!(
                ratio = outcome.ratio,
                completed = outcome.completed,
                "trace attempt resolved"
            ),
            Err(_) => tracing::info!(ratio = self.ratio(), "trace attempt dismissed"),
        }
        attempt.resolve(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Image, Point, Size};
    use std::cell::Cell;

    fn poll(attempt: &mut Attempt) -> Poll<AttemptResult> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(attempt).poll(&mut cx)
    }

    fn small_spec() -> GuideSpec {
        GuideSpec::default()
            .with_text("I")
            .with_size(120, 120)
            .with_font_size(80.0)
    }

    // trace every outline of the guide with a single pointer
    fn trace_outline(engine: &mut TraceEngine) {
        let outline = engine.guide().outline().to_vec();
        for polyline in outline {
            let mut points = polyline.points.iter();
            if let Some(first) = points.next() {
                engine.pointer_down(PointerEvent::new(1, *first));
            }
            for point in points {
                engine.pointer_move(PointerEvent::new(1, *point));
            }
            engine.pointer_up(PointerEvent::new(1, Point::default()));
        }
    }

    #[test]
    fn test_attempt_single_shot() {
        let mut attempt = Attempt::new();
        let other = attempt.clone();
        assert_eq!(attempt, other);
        assert_ne!(attempt, Attempt::new());
        assert!(poll(&mut attempt).is_pending());
        assert!(attempt.resolve(Err(Dismissed)));
        assert!(!attempt.resolve(Ok(AttemptOutcome {
            ratio: 1.0,
            completed: true,
        })));
        assert_eq!(poll(&mut attempt), Poll::Ready(Err(Dismissed)));
        assert_eq!(other.result(), Some(Err(Dismissed)));
        assert!(!other.is_pending());
    }

    #[test]
    fn test_auto_finish_after_grace() {
        let mut engine = TraceEngine::configure(small_spec());
        let mut attempt = engine.start();
        assert_eq!(engine.state(), EngineState::AwaitingGesture);
        assert!(engine.guide().required_count() > 0);

        trace_outline(&mut engine);
        assert!(engine.threshold_reached());
        assert!(engine.is_active());
        assert!(poll(&mut attempt).is_pending());

        // pointer down is ignored while the finish is pending
        engine.pointer_down(PointerEvent::new(2, (60.0, 60.0)));
        assert_eq!(engine.state(), EngineState::AwaitingGesture);

        engine.advance(Duration::from_millis(100));
        assert!(engine.is_active());
        engine.advance(Duration::from_millis(20));
        assert!(!engine.is_active());
        assert_eq!(engine.state(), EngineState::Idle);
        match poll(&mut attempt) {
            Poll::Ready(Ok(outcome)) => {
                assert!(outcome.completed);
                assert!(outcome.ratio >= 0.7);
            }
            result => panic!("unexpected attempt result: {:?}", result),
        }
    }

    #[test]
    fn test_confirm_policy() {
        let spec = small_spec().with_policy(CompletionPolicy::Confirm);
        let mut engine = TraceEngine::configure(spec);
        let attempt = engine.start();

        // enter before the threshold does nothing
        engine.key_down(Key::Enter);
        assert!(engine.is_active());
        assert!(!engine.frame().confirm_enabled);

        trace_outline(&mut engine);
        engine.advance(Duration::from_secs(1));
        assert!(engine.is_active());
        assert!(engine.frame().confirm_enabled);

        engine.key_down(Key::Enter);
        assert!(!engine.is_active());
        assert!(matches!(
            attempt.result(),
            Some(Ok(AttemptOutcome {
                completed: true,
                ..
            }))
        ));
    }

    #[test]
    fn test_accept_partial() {
        let spec = small_spec().with_policy(CompletionPolicy::Confirm);
        let mut engine = TraceEngine::configure(spec);
        let attempt = engine.start();
        engine.force_finish(true);
        assert_eq!(
            attempt.result(),
            Some(Ok(AttemptOutcome {
                ratio: 0.0,
                completed: false,
            }))
        );
        // finishing without a pending attempt is a no-op
        engine.force_finish(false);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_pointer_ownership() {
        let mut engine = TraceEngine::configure(small_spec());
        engine.start();
        let outline = engine.guide().outline()[0].clone();
        let [start, end] = [outline.points[0], outline.points[outline.points.len() - 1]];

        engine.pointer_down(PointerEvent::new(1, start));
        let covered = engine.coverage().count();
        assert!(covered > 0);
        // second pointer neither starts nor moves the stroke
        engine.pointer_down(PointerEvent::new(2, end));
        engine.pointer_move(PointerEvent::new(2, end));
        assert_eq!(engine.coverage().count(), covered);
        engine.pointer_up(PointerEvent::new(2, end));
        assert_eq!(engine.state(), EngineState::Drawing);

        // capture loss ends the stroke and keeps coverage
        engine.pointer_capture_lost(1);
        assert_eq!(engine.state(), EngineState::AwaitingGesture);
        assert_eq!(engine.coverage().count(), covered);
        engine.pointer_move(PointerEvent::new(1, end));
        assert_eq!(engine.coverage().count(), covered);
        assert_eq!(engine.frame().strokes.len(), 1);
    }

    #[test]
    fn test_font_loading() {
        let mut engine = TraceEngine::new(small_spec(), FontState::Loading);
        let attempt = engine.start();
        assert_eq!(engine.state(), EngineState::Preparing);
        // gestures are ignored while preparing
        engine.pointer_down(PointerEvent::new(1, (60.0, 60.0)));
        assert_eq!(engine.state(), EngineState::Preparing);
        assert_eq!(engine.frame().guide_revision, 0);

        engine.font_loaded(Err(GlyphError::InvalidLine(1)));
        assert_eq!(engine.state(), EngineState::AwaitingGesture);
        assert_eq!(engine.frame().guide_revision, 1);
        assert!(engine.guide().required_count() > 0);
        assert!(attempt.is_pending());
    }

    #[test]
    fn test_font_timeout() {
        let spec = small_spec().with_font_timeout(Duration::from_millis(500));
        let mut engine = TraceEngine::new(spec, FontState::Loading);
        engine.start();
        engine.advance(Duration::from_millis(300));
        assert_eq!(engine.state(), EngineState::Preparing);
        engine.advance(Duration::from_millis(300));
        assert_eq!(engine.state(), EngineState::AwaitingGesture);

        // without timeout the engine waits forever
        let mut engine = TraceEngine::new(small_spec(), FontState::Loading);
        engine.start();
        engine.advance(Duration::from_secs(3600));
        assert_eq!(engine.state(), EngineState::Preparing);
    }

    #[test]
    fn test_listeners_follow_attempt() {
        struct Flag(Rc<Cell<bool>>);
        impl InputSource for Flag {
            fn attach(&mut self) {
                self.0.set(true);
            }
            fn detach(&mut self) {
                self.0.set(false);
            }
        }

        let attached = Rc::new(Cell::new(false));
        let mut engine =
            TraceEngine::configure(small_spec()).with_input(Box::new(Flag(attached.clone())));
        assert!(!attached.get());
        engine.start();
        assert!(attached.get());
        engine.key_down(Key::Escape);
        assert!(!attached.get());

        engine.start();
        assert!(attached.get());
        drop(engine);
        assert!(!attached.get());
    }

    #[test]
    fn test_viewport_scaling() {
        let mut engine = TraceEngine::configure(small_spec());
        let size = engine.spec().size();
        // raster shown at half size
        engine.set_viewport(Viewport::new((0.0, 0.0), 60.0, 60.0, size));
        engine.start();
        let point = engine.guide().outline()[0].points[0];
        engine.pointer_down(PointerEvent::new(1, 0.5 * point));
        assert!(engine.coverage().count() > 0);
        let stroke = &engine.frame().strokes[0];
        assert!(stroke.points[0].is_close_to(point));
        let Size { width, height } = engine.frame().render().shape().size();
        assert_eq!((width, height), (120, 120));
    }
}
