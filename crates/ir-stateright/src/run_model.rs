//! Stateright model of concurrent refinement runs.
//!
//! Each caller owns a [`RunMachine`]. An invocation claims the shared
//! in-flight slot or is rejected; the slot is released when the run reaches a
//! terminal state. Service outcomes are nondeterministic: generation may
//! succeed or fail, analysis may match, mismatch or fail. A caller may also
//! abandon its run in any active state.

use ir_core::{AttemptNumber, RunMachine, RunState};
use stateright::Model;

/// Index of a caller.
pub type CallerId = usize;

/// One caller and the run it started, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    pub machine: RunMachine,
    /// Invocation was refused because another run was in flight
    pub rejected: bool,
    /// Verdict of the first analysis, once received
    pub first_verdict: Option<bool>,
}

impl Caller {
    fn new() -> Self {
        Self {
            machine: RunMachine::new(),
            rejected: false,
            first_verdict: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunModelState {
    /// Holder of the in-flight slot
    pub in_flight: Option<CallerId>,
    pub callers: Vec<Caller>,
}

impl RunModelState {
    pub fn new(callers_count: usize) -> Self {
        debug_assert!(callers_count > 0, "Must have at least one caller");
        debug_assert!(callers_count <= 4, "Model checking with many callers is slow");

        Self {
            in_flight: None,
            callers: (0..callers_count).map(|_| Caller::new()).collect(),
        }
    }

    /// No run makes more than two generations or two analyses.
    pub fn bounded_attempts(&self) -> bool {
        self.callers
            .iter()
            .all(|c| c.machine.generations_count() <= 2 && c.machine.analyses_count() <= 2)
    }

    /// At most one run is active, and it holds the slot.
    pub fn single_active_run(&self) -> bool {
        let active: Vec<CallerId> = self
            .callers
            .iter()
            .enumerate()
            .filter(|(_, c)| c.machine.state().is_active())
            .map(|(id, _)| id)
            .collect();
        match active.as_slice() {
            [] => self.in_flight.is_none(),
            [id] => self.in_flight == Some(*id),
            _ => false,
        }
    }

    /// A second attempt only follows a mismatching first verdict.
    pub fn retry_only_after_mismatch(&self) -> bool {
        self.callers.iter().all(|c| {
            c.machine.attempt() == AttemptNumber::First || c.first_verdict == Some(false)
        })
    }

    /// A rejected invocation made no service call.
    pub fn rejected_makes_no_calls(&self) -> bool {
        self.callers
            .iter()
            .all(|c| !c.rejected || c.machine == RunMachine::new())
    }

    /// A completed run analyzed every image it generated.
    pub fn completed_runs_fully_analyzed(&self) -> bool {
        self.callers.iter().all(|c| {
            c.machine.state() != RunState::Completed
                || c.machine.analyses_count() == c.machine.generations_count()
        })
    }

    pub fn invariants_hold(&self) -> bool {
        self.bounded_attempts()
            && self.single_active_run()
            && self.retry_only_after_mismatch()
            && self.rejected_makes_no_calls()
            && self.completed_runs_fully_analyzed()
    }

    fn release(&mut self, caller: CallerId) {
        if self.in_flight == Some(caller) {
            self.in_flight = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunAction {
    /// Caller invokes a run
    Invoke { caller: CallerId },
    /// Generation returned an image
    Generated { caller: CallerId },
    /// Generation failed or returned no image
    GenerationFailed { caller: CallerId },
    /// Analysis returned a verdict
    Verdict { caller: CallerId, matches: bool },
    /// Analysis failed or returned an undecodable response
    AnalysisFailed { caller: CallerId },
    /// Refined prompt built; generate again
    Retry { caller: CallerId },
    /// Caller dropped the run mid-flight
    Cancel { caller: CallerId },
}

pub struct RunModel {
    pub callers_count: usize,
}

impl RunModel {
    pub fn new(callers_count: usize) -> Self {
        debug_assert!(callers_count > 0);
        Self { callers_count }
    }
}

impl Model for RunModel {
    type State = RunModelState;
    type Action = RunAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![RunModelState::new(self.callers_count)]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (caller, c) in state.callers.iter().enumerate() {
            match c.machine.state() {
                RunState::Idle if !c.rejected => actions.push(RunAction::Invoke { caller }),
                RunState::GeneratingImage => {
                    actions.push(RunAction::Generated { caller });
                    actions.push(RunAction::GenerationFailed { caller });
                }
                RunState::AnalyzingImage => {
                    actions.push(RunAction::Verdict { caller, matches: true });
                    actions.push(RunAction::Verdict { caller, matches: false });
                    actions.push(RunAction::AnalysisFailed { caller });
                }
                RunState::RetryingWithRefinedPrompt => actions.push(RunAction::Retry { caller }),
                RunState::Idle | RunState::Completed | RunState::Failed => {}
            }
            if c.machine.state().is_active() {
                actions.push(RunAction::Cancel { caller });
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();

        match action {
            RunAction::Invoke { caller } => {
                if next.in_flight.is_some() {
                    next.callers.get_mut(caller)?.rejected = true;
                } else {
                    next.callers.get_mut(caller)?.machine.start().ok()?;
                    next.in_flight = Some(caller);
                }
            }
            RunAction::Generated { caller } => {
                next.callers.get_mut(caller)?.machine.image_generated().ok()?;
            }
            RunAction::GenerationFailed { caller } | RunAction::AnalysisFailed { caller } => {
                next.callers.get_mut(caller)?.machine.fail().ok()?;
                next.release(caller);
            }
            RunAction::Verdict { caller, matches } => {
                let c = next.callers.get_mut(caller)?;
                if c.machine.attempt() == AttemptNumber::First {
                    c.first_verdict = Some(matches);
                }
                c.machine.verdict(matches).ok()?;
                if c.machine.state().is_terminal() {
                    next.release(caller);
                }
            }
            RunAction::Retry { caller } => {
                next.callers.get_mut(caller)?.machine.retry().ok()?;
            }
            RunAction::Cancel { caller } => {
                next.callers.get_mut(caller)?.machine.cancel().ok()?;
                next.release(caller);
            }
        }

        Some(next)
    }

    fn properties(&self) -> Vec<stateright::Property<Self>> {
        vec![
            stateright::Property::always("BoundedAttempts", |_: &Self, state: &Self::State| {
                state.bounded_attempts()
            }),
            stateright::Property::always("SingleActiveRun", |_: &Self, state: &Self::State| {
                state.single_active_run()
            }),
            stateright::Property::always("RetryOnlyAfterMismatch", |_: &Self, state: &Self::State| {
                state.retry_only_after_mismatch()
            }),
            stateright::Property::always("RejectedMakesNoCalls", |_: &Self, state: &Self::State| {
                state.rejected_makes_no_calls()
            }),
            stateright::Property::always(
                "CompletedRunsFullyAnalyzed",
                |_: &Self, state: &Self::State| state.completed_runs_fully_analyzed(),
            ),
            stateright::Property::sometimes("RetryCompletes", |_: &Self, state: &Self::State| {
                state.callers.iter().any(|c| {
                    c.machine.state() == RunState::Completed && c.machine.attempt().is_retry()
                })
            }),
            stateright::Property::sometimes("ConcurrentInvocationRejected", |_: &Self, state: &Self::State| {
                state.callers.iter().any(|c| c.rejected)
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn test_initial_state() {
        let state = RunModelState::new(2);
        assert!(state.in_flight.is_none());
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_second_invocation_rejected() {
        let model = RunModel::new(2);
        let state = RunModelState::new(2);
        let state = model.next_state(&state, RunAction::Invoke { caller: 0 }).unwrap();
        let state = model.next_state(&state, RunAction::Invoke { caller: 1 }).unwrap();

        assert_eq!(state.in_flight, Some(0));
        assert!(state.callers[1].rejected);
        assert_eq!(state.callers[1].machine.state(), RunState::Idle);
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_slot_released_on_completion() {
        let model = RunModel::new(1);
        let mut state = RunModelState::new(1);
        for action in [
            RunAction::Invoke { caller: 0 },
            RunAction::Generated { caller: 0 },
            RunAction::Verdict { caller: 0, matches: false },
            RunAction::Retry { caller: 0 },
            RunAction::Generated { caller: 0 },
            RunAction::Verdict { caller: 0, matches: false },
        ] {
            state = model.next_state(&state, action).unwrap();
        }
        assert_eq!(state.callers[0].machine.state(), RunState::Completed);
        assert_eq!(state.callers[0].machine.generations_count(), 2);
        assert!(state.in_flight.is_none());

        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(actions.is_empty(), "terminal run offered {:?}", actions);
    }

    #[test]
    fn test_cancel_releases_slot() {
        let model = RunModel::new(2);
        let mut state = RunModelState::new(2);
        for action in [
            RunAction::Invoke { caller: 0 },
            RunAction::Generated { caller: 0 },
            RunAction::Cancel { caller: 0 },
        ] {
            state = model.next_state(&state, action).unwrap();
            assert!(state.invariants_hold());
        }
        assert_eq!(state.callers[0].machine.state(), RunState::Failed);
        assert!(state.in_flight.is_none());

        let state = model.next_state(&state, RunAction::Invoke { caller: 1 }).unwrap();
        assert_eq!(state.in_flight, Some(1));
        assert!(!state.callers[1].rejected);
    }

    #[test]
    fn test_model_checking_single_caller() {
        let checker = RunModel::new(1).checker().threads(1).spawn_bfs().join();
        assert!(checker.discovery("RetryCompletes").is_some());
        assert!(checker.discovery("ConcurrentInvocationRejected").is_none());
    }

    #[test]
    fn test_model_checking_two_callers() {
        RunModel::new(2)
            .checker()
            .threads(1)
            .spawn_bfs()
            .join()
            .assert_properties();
    }

    #[test]
    fn test_model_checking_three_callers() {
        RunModel::new(3)
            .checker()
            .threads(1)
            .spawn_bfs()
            .join()
            .assert_properties();
    }
}
