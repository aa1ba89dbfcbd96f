use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Progress of one build target through the release pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    NotStarted,
    Fetched,
    Configured,
    Built,
    PostProcessed,
    Packaged,
    Done,
    Failed,
}

impl TargetState {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetState::NotStarted => "not_started",
            TargetState::Fetched => "fetched",
            TargetState::Configured => "configured",
            TargetState::Built => "built",
            TargetState::PostProcessed => "post_processed",
            TargetState::Packaged => "packaged",
            TargetState::Done => "done",
            TargetState::Failed => "failed",
        }
    }

    /// The single forward successor, `None` for terminal states.
    pub fn next(self) -> Option<TargetState> {
        match self {
            TargetState::NotStarted => Some(TargetState::Fetched),
            TargetState::Fetched => Some(TargetState::Configured),
            TargetState::Configured => Some(TargetState::Built),
            TargetState::Built => Some(TargetState::PostProcessed),
            TargetState::PostProcessed => Some(TargetState::Packaged),
            TargetState::Packaged => Some(TargetState::Done),
            TargetState::Done | TargetState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TargetState::Done | TargetState::Failed)
    }

    pub fn can_transition_to(self, to: TargetState) -> bool {
        if to == TargetState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("illegal transition for '{target}': {from} -> {to}")]
pub struct TransitionError {
    pub target: String,
    pub from: TargetState,
    pub to: TargetState,
}

/// State of one target plus the transitions it went through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTracker {
    target: String,
    current: TargetState,
    history: Vec<TargetState>,
}

impl StateTracker {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            current: TargetState::NotStarted,
            history: vec![TargetState::NotStarted],
        }
    }

    pub fn current(&self) -> TargetState {
        self.current
    }

    pub fn history(&self) -> &[TargetState] {
        &self.history
    }

    pub fn advance(&mut self, to: TargetState) -> Result<(), TransitionError> {
        if !self.current.can_transition_to(to) {
            return Err(TransitionError {
                target: self.target.clone(),
                from: self.current,
                to,
            });
        }
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.current = TargetState::Failed;
            self.history.push(TargetState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_forward_to_done() {
        let mut tracker = StateTracker::new("libfoo");
        let mut state = TargetState::NotStarted;
        while let Some(next) = state.next() {
            tracker.advance(next).expect("advance");
            state = next;
        }
        assert_eq!(tracker.current(), TargetState::Done);
        assert_eq!(tracker.history().len(), 7);
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut tracker = StateTracker::new("libfoo");
        let error = tracker.advance(TargetState::Built).expect_err("illegal");
        assert_eq!(error.from, TargetState::NotStarted);
        assert_eq!(tracker.current(), TargetState::NotStarted);
    }

    #[test]
    fn failed_is_reachable_from_any_live_state() {
        for state in [
            TargetState::NotStarted,
            TargetState::Fetched,
            TargetState::Configured,
            TargetState::Built,
            TargetState::PostProcessed,
            TargetState::Packaged,
        ] {
            assert!(state.can_transition_to(TargetState::Failed));
        }
        assert!(!TargetState::Done.can_transition_to(TargetState::Failed));
    }

    #[test]
    fn fail_is_sticky() {
        let mut tracker = StateTracker::new("libfoo");
        tracker.advance(TargetState::Fetched).expect("advance");
        tracker.fail();
        tracker.fail();
        assert_eq!(tracker.current(), TargetState::Failed);
        assert_eq!(
            tracker.history(),
            &[
                TargetState::NotStarted,
                TargetState::Fetched,
                TargetState::Failed
            ]
        );
    }
}
