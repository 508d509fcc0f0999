//! Write trigger gated by trace attempts
use crate::{Attempt, Scalar, ScoreBoard, SessionStore, TraceEngine};
use std::fmt;

/// Result of a write request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteEvent {
    /// Attempt was accepted and the counter advanced
    Written { count: u64, score: Scalar },
    /// Attempt was dismissed, nothing was counted
    Cancelled,
}

/// Ties user write actions to trace attempts
///
/// Each write has to be earned by tracing the guide. Accepted attempts advance
/// the visible counter, the session count and the score board.
pub struct WriteController<S> {
    engine: TraceEngine,
    sessions: S,
    scores: ScoreBoard,
    pending: Option<Attempt>,
    count: u64,
    writing: bool,
}

impl<S: fmt::Debug> fmt::Debug for WriteController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteController")
            .field("engine", &self.engine)
            .field("sessions", &self.sessions)
            .field("scores", &self.scores)
            .field("count", &self.count)
            .field("writing", &self.writing)
            .finish()
    }
}

impl<S: SessionStore> WriteController<S> {
    /// Create controller and start a writing session
    pub fn new(engine: TraceEngine, mut sessions: S, scores: ScoreBoard) -> Self {
        if sessions.current().is_none() {
            sessions.start_session();
        }
        Self {
            engine,
            sessions,
            scores,
            pending: None,
            count: 0,
            writing: true,
        }
    }

    /// Engine receiving pointer, key and clock events
    pub fn engine(&mut self) -> &mut TraceEngine {
        &mut self.engine
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    /// Visible write counter
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_writing(&self) -> bool {
        self.writing
    }

    /// Request a write, starts or joins a trace attempt
    ///
    /// Returns `None` while writing is paused.
    pub fn trigger(&mut self) -> Option<Attempt> {
        if !self.writing {
            return None;
        }
        let attempt = self.engine.start();
        self.pending = Some(attempt.clone());
        Some(attempt)
    }

    /// Collect result of the pending attempt once it is resolved
    pub fn poll(&mut self) -> Option<WriteEvent> {
        let result = self.pending.as_ref()?.result()?;
        self.pending = None;
        match result {
            Ok(outcome) => {
                self.count += 1;
                self.sessions.increment_count();
                let score = outcome.score();
                self.scores.record(score);
                tracing::debug!(count = self.count, score, "written");
                Some(WriteEvent::Written {
                    count: self.count,
                    score,
                })
            }
            Err(_) => Some(WriteEvent::Cancelled),
        }
    }

    /// Pause or resume writing, returns whether writing is enabled
    pub fn toggle_writing(&mut self) -> bool {
        self.writing = !self.writing;
        self.writing
    }

    /// Take back the last write from the visible counter
    pub fn remove_last(&mut self) -> u64 {
        self.count = self.count.saturating_sub(1);
        self.count
    }

    /// End the writing session, called when the host shuts down
    pub fn finish_session(&mut self) {
        self.sessions.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionPolicy, GuideSpec, KvSessionStore, MemoryStore, assert_approx_eq};

    fn controller(store: &MemoryStore) -> WriteController<KvSessionStore> {
        let spec = GuideSpec::default()
            .with_text("I")
            .with_policy(CompletionPolicy::Confirm);
        WriteController::new(
            TraceEngine::configure(spec),
            KvSessionStore::new(Box::new(store.clone())),
            ScoreBoard::load(Box::new(store.clone())),
        )
    }

    #[test]
    fn test_write_flow() {
        let store = MemoryStore::new();
        let mut writer = controller(&store);
        assert_eq!(writer.poll(), None);

        let attempt = writer.trigger();
        assert!(attempt.is_some());
        // triggering again joins the pending attempt
        assert_eq!(writer.trigger(), attempt);
        assert_eq!(writer.poll(), None);

        writer.engine().force_finish(true);
        match writer.poll() {
            Some(WriteEvent::Written { count, score }) => {
                assert_eq!(count, 1);
                assert_approx_eq!(score, 0.0);
            }
            event => panic!("unexpected write event: {:?}", event),
        }
        assert_eq!(writer.poll(), None);
        assert_eq!(writer.sessions().current().map(|s| s.count), Some(1));
        assert_eq!(writer.scores().scores().attempts, 1);

        writer.trigger();
        writer.engine().force_finish(false);
        assert_eq!(writer.poll(), Some(WriteEvent::Cancelled));
        assert_eq!(writer.count(), 1);
        assert_eq!(writer.scores().scores().attempts, 1);

        assert_eq!(writer.remove_last(), 0);
        assert_eq!(writer.remove_last(), 0);

        writer.finish_session();
        assert_eq!(writer.sessions().sessions().len(), 1);
    }

    #[test]
    fn test_paused() {
        let store = MemoryStore::new();
        let mut writer = controller(&store);
        assert!(!writer.toggle_writing());
        assert_eq!(writer.trigger(), None);
        assert!(!writer.engine().is_active());
        assert!(writer.toggle_writing());
        assert!(writer.trigger().is_some());
    }
}
