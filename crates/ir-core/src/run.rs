//! Run state machine.
//!
//! A run moves through at most two generate/analyze attempts. The bound is
//! carried by [`AttemptNumber`], which only has two values: there is no
//! attempt after [`AttemptNumber::Second`], so a second retry cannot be
//! expressed.

use std::fmt;

use serde::Serialize;

use crate::image::ImageData;
use crate::verdict::Verdict;

/// Which attempt of a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AttemptNumber {
    First,
    Second,
}

impl AttemptNumber {
    /// Numeric value: 1 or 2.
    pub fn get(self) -> u8 {
        match self {
            AttemptNumber::First => 1,
            AttemptNumber::Second => 2,
        }
    }

    /// The attempt that follows this one, if any.
    pub fn next(self) -> Option<AttemptNumber> {
        match self {
            AttemptNumber::First => Some(AttemptNumber::Second),
            AttemptNumber::Second => None,
        }
    }

    pub fn is_retry(self) -> bool {
        self == AttemptNumber::Second
    }
}

impl fmt::Display for AttemptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    Idle,
    GeneratingImage,
    AnalyzingImage,
    RetryingWithRefinedPrompt,
    Completed,
    Failed,
}

impl RunState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Whether a run in this state counts as in flight.
    pub fn is_active(self) -> bool {
        !matches!(self, RunState::Idle) && !self.is_terminal()
    }

    pub fn name(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::GeneratingImage => "generating_image",
            RunState::AnalyzingImage => "analyzing_image",
            RunState::RetryingWithRefinedPrompt => "retrying_with_refined_prompt",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input that drives the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunEvent {
    /// Caller invoked the run
    Start,
    /// Generation returned a usable image
    ImageGenerated,
    /// Analysis returned a verdict
    VerdictReceived { matches: bool },
    /// The refined prompt is ready; generate again
    Retry,
    /// A service call failed
    ServiceFailed,
    /// The caller abandoned the run before it finished
    Cancelled,
}

/// What the orchestrator does after a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Return the current image and verdict
    Complete,
    /// Refine the prompt and run the given attempt
    Retry(AttemptNumber),
}

/// Event not accepted in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event {event:?} not allowed in state {state}")]
pub struct TransitionError {
    pub state: RunState,
    pub event: RunEvent,
}

/// The run state machine.
///
/// Pure bookkeeping: it performs no I/O and is shared by the orchestrator and
/// the model checker, so both exercise the same transition table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunMachine {
    state: RunState,
    attempt: AttemptNumber,
    generations_count: u8,
    analyses_count: u8,
}

impl Default for RunMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            attempt: AttemptNumber::First,
            generations_count: 0,
            analyses_count: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn attempt(&self) -> AttemptNumber {
        self.attempt
    }

    /// Generation calls started so far.
    pub fn generations_count(&self) -> u8 {
        self.generations_count
    }

    /// Analysis calls started so far.
    pub fn analyses_count(&self) -> u8 {
        self.analyses_count
    }

    /// Apply an event, returning the new state.
    pub fn apply(&mut self, event: RunEvent) -> Result<RunState, TransitionError> {
        let rejected = TransitionError {
            state: self.state,
            event,
        };

        let next = match (self.state, event) {
            (RunState::Idle, RunEvent::Start) => {
                self.generations_count += 1;
                RunState::GeneratingImage
            }
            (RunState::GeneratingImage, RunEvent::ImageGenerated) => {
                self.analyses_count += 1;
                RunState::AnalyzingImage
            }
            (RunState::AnalyzingImage, RunEvent::VerdictReceived { matches }) => {
                match (matches, self.attempt.next()) {
                    (false, Some(_)) => RunState::RetryingWithRefinedPrompt,
                    _ => RunState::Completed,
                }
            }
            (RunState::RetryingWithRefinedPrompt, RunEvent::Retry) => {
                let next_attempt = self.attempt.next().ok_or(rejected)?;
                self.attempt = next_attempt;
                self.generations_count += 1;
                RunState::GeneratingImage
            }
            (RunState::GeneratingImage | RunState::AnalyzingImage, RunEvent::ServiceFailed) => {
                RunState::Failed
            }
            (state, RunEvent::Cancelled) if state.is_active() => RunState::Failed,
            _ => return Err(rejected),
        };

        debug_assert!(self.generations_count <= 2, "more than two generations");
        debug_assert!(self.analyses_count <= self.generations_count);

        tracing::debug!(from = %self.state, to = %next, attempt = %self.attempt, "run transition");
        self.state = next;
        Ok(next)
    }

    pub fn start(&mut self) -> Result<RunState, TransitionError> {
        self.apply(RunEvent::Start)
    }

    pub fn image_generated(&mut self) -> Result<RunState, TransitionError> {
        self.apply(RunEvent::ImageGenerated)
    }

    /// Record a verdict and decide whether to retry.
    pub fn verdict(&mut self, matches: bool) -> Result<Decision, TransitionError> {
        match self.apply(RunEvent::VerdictReceived { matches })? {
            RunState::RetryingWithRefinedPrompt => {
                let next = self.attempt.next().ok_or(TransitionError {
                    state: self.state,
                    event: RunEvent::Retry,
                })?;
                Ok(Decision::Retry(next))
            }
            _ => Ok(Decision::Complete),
        }
    }

    pub fn retry(&mut self) -> Result<RunState, TransitionError> {
        self.apply(RunEvent::Retry)
    }

    pub fn fail(&mut self) -> Result<RunState, TransitionError> {
        self.apply(RunEvent::ServiceFailed)
    }

    pub fn cancel(&mut self) -> Result<RunState, TransitionError> {
        self.apply(RunEvent::Cancelled)
    }
}

/// One attempt of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRun {
    pub attempt: AttemptNumber,
    /// Prompt sent to generation; differs from the user's prompt on retry
    pub effective_prompt: String,
    pub generated_image: Option<ImageData>,
    pub verdict: Option<Verdict>,
}

impl AnalysisRun {
    pub fn new(attempt: AttemptNumber, effective_prompt: impl Into<String>) -> Self {
        Self {
            attempt,
            effective_prompt: effective_prompt.into(),
            generated_image: None,
            verdict: None,
        }
    }
}

/// Final image and verdict of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub image: ImageData,
    pub verdict: Verdict,
    /// Attempts used: 1, or 2 if the first verdict was a mismatch
    pub attempts: AttemptNumber,
    /// Status lines in the order they were emitted
    pub status_log: Vec<String>,
}

impl RunResult {
    pub fn attempts_count(&self) -> u8 {
        self.attempts.get()
    }
}

/// Observable view of the orchestrator, published on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub state: RunState,
    pub attempt: Option<AttemptNumber>,
    pub effective_prompt: Option<String>,
    pub status: Option<String>,
    /// Every status of the current run so far
    pub status_log: Vec<String>,
}

impl RunSnapshot {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            attempt: None,
            effective_prompt: None,
            status: None,
            status_log: Vec::new(),
        }
    }
}
