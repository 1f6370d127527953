use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::ItemKind;

/// Run-control state of one web session. Exactly one state is active at a
/// time; the state is owned by the session and never shared across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    AwaitingStartConfirmation,
    Processing,
    AwaitingCancelConfirmation,
}

/// User button actions. `PipelineComplete` is the automatic transition
/// fired when a spawned run finishes; it is never sent by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    RequestStart,
    Confirm,
    Cancel,
    RequestCancel,
    PipelineComplete,
}

/// Apply one action to a state. Invalid (state, action) pairs are no-ops:
/// the current state is kept rather than surfacing an error to the form.
pub fn apply(state: RunState, action: ControlAction) -> RunState {
    use ControlAction::*;
    use RunState::*;

    match (state, action) {
        (Idle, RequestStart) => AwaitingStartConfirmation,
        (AwaitingStartConfirmation, Confirm) => Processing,
        (AwaitingStartConfirmation, Cancel) => Idle,
        (Processing, RequestCancel) => AwaitingCancelConfirmation,
        (AwaitingCancelConfirmation, Confirm) => Idle,
        (AwaitingCancelConfirmation, Cancel) => Processing,
        (Processing, PipelineComplete) => Idle,
        (current, _) => current,
    }
}

/// The job captured when a start is requested, executed on confirmation.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub path: PathBuf,
    pub kind: ItemKind,
    pub instruction: Option<String>,
}

/// Per-session state: the run-control machine plus the pending job, the
/// last finished outcome, and a generation counter identifying the run
/// that currently owns the session.
#[derive(Debug)]
pub struct Session {
    pub state: RunState,
    pub pending: Option<JobRequest>,
    pub last_outcome: Option<String>,
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            pending: None,
            last_outcome: None,
            generation: 0,
        }
    }
}

impl Session {
    /// Apply a user action, returning (previous, new) states.
    pub fn transition(&mut self, action: ControlAction) -> (RunState, RunState) {
        let before = self.state;
        let after = apply(before, action);
        self.state = after;
        (before, after)
    }

    /// Mark the start of a new run and return its generation. Call when
    /// the machine enters `Processing`.
    pub fn begin_run(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Record a finished run and fire the automatic completion transition.
    /// A completion from a superseded run is ignored: only the generation
    /// that currently owns the session may move it or publish its outcome.
    pub fn finish_run(&mut self, generation: u64, outcome: String) -> bool {
        if generation != self.generation {
            return false;
        }
        self.last_outcome = Some(outcome);
        self.transition(ControlAction::PipelineComplete);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControlAction::*;
    use RunState::*;

    #[test]
    fn start_flow_reaches_processing() {
        let s = apply(Idle, RequestStart);
        assert_eq!(s, AwaitingStartConfirmation);
        assert_eq!(apply(s, Confirm), Processing);
    }

    #[test]
    fn cancelled_start_returns_to_idle_without_processing() {
        let mut states = vec![Idle];
        let mut s = apply(Idle, RequestStart);
        states.push(s);
        s = apply(s, Cancel);
        states.push(s);

        assert_eq!(s, Idle);
        assert!(!states.contains(&Processing));
    }

    #[test]
    fn cancel_flow_from_processing() {
        let s = apply(Processing, RequestCancel);
        assert_eq!(s, AwaitingCancelConfirmation);
        assert_eq!(apply(s, Confirm), Idle);
        assert_eq!(apply(s, Cancel), Processing);
    }

    #[test]
    fn completion_is_automatic_only_from_processing() {
        assert_eq!(apply(Processing, PipelineComplete), Idle);
        // A run cancelled at the machine level stays Idle once complete fires.
        assert_eq!(apply(Idle, PipelineComplete), Idle);
    }

    #[test]
    fn invalid_actions_are_no_ops() {
        assert_eq!(apply(Idle, Confirm), Idle);
        assert_eq!(apply(Idle, RequestCancel), Idle);
        assert_eq!(apply(Processing, RequestStart), Processing);
        assert_eq!(
            apply(AwaitingStartConfirmation, RequestCancel),
            AwaitingStartConfirmation
        );
    }

    #[test]
    fn superseded_generation_cannot_finish_the_session() {
        let mut session = Session::default();
        session.transition(RequestStart);
        session.transition(Confirm);
        let old = session.begin_run();
        session.transition(RequestCancel);
        session.transition(Confirm);
        session.transition(RequestStart);
        session.transition(Confirm);
        let current = session.begin_run();

        assert!(!session.finish_run(old, "old".to_string()));
        assert_eq!(session.state, Processing);
        assert!(session.last_outcome.is_none());

        assert!(session.finish_run(current, "new".to_string()));
        assert_eq!(session.state, Idle);
        assert_eq!(session.last_outcome.as_deref(), Some("new"));
    }

    #[test]
    fn session_transition_reports_before_and_after() {
        let mut session = Session::default();
        let (before, after) = session.transition(RequestStart);
        assert_eq!(before, Idle);
        assert_eq!(after, AwaitingStartConfirmation);
        assert_eq!(session.state, AwaitingStartConfirmation);
    }
}
