//! Generate, analyze, and retry once on mismatch.
//!
//! The loop is bounded by [`AttemptNumber`]: the first verdict may trigger one
//! retry with a refined prompt, the second verdict always ends the run.
//! Analysis is always judged against the caller's prompt, never the refined
//! one. Service errors end the run immediately; only a semantic mismatch is
//! retried. A run whose future is dropped mid-flight ends `Failed` with
//! [`STATUS_CANCELLED`].

use std::sync::atomic::{AtomicBool, Ordering};

use ir_core::{
    normalize, normalize_analysis_failure, AnalysisRun, AttemptNumber, Decision, ErrorKind,
    GenerateOptions, ImageAnalysisService, ImageGenerationService, Prompt, RunError, RunEvent,
    RunMachine, RunResult, RunSnapshot, RunState, TransitionError, UserFacingError,
};
use tokio::sync::watch;

use crate::error::EmptyImage;
use crate::prompt::PromptBuilder;

pub const GENERATION_CONTEXT: &str = "image generation for analysis";
pub const ANALYSIS_CONTEXT: &str = "image analysis";

pub const STATUS_GENERATING_INITIAL: &str = "Generating initial image...";
pub const STATUS_GENERATING_REFINED: &str = "Generating refined image...";
pub const STATUS_ANALYZING: &str = "Analyzing generated image...";
pub const STATUS_RETRYING: &str = "Image did not match prompt. Retrying with refined instructions...";
pub const STATUS_MATCHED: &str = "Analysis complete: Image matches prompt.";
pub const STATUS_MISMATCH_AFTER_RETRY: &str = "Analysis complete: Image may not fully match prompt after retry.";
pub const STATUS_FAILED: &str = "An error occurred.";
pub const STATUS_CANCELLED: &str = "Run cancelled.";

pub const NO_IMAGE_MESSAGE: &str =
    "The model did not return an image from the generation process. Please adjust your prompt.";
pub const RUN_IN_PROGRESS_MESSAGE: &str =
    "A refinement run is already in progress. Please wait for it to finish.";

/// Holds the in-flight flag; releasing it on drop.
struct ActiveRun<'a>(&'a AtomicBool);

impl<'a> ActiveRun<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveRun(flag))
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-run bookkeeping: machine, current attempt and emitted statuses.
struct RunProgress<'a> {
    machine: RunMachine,
    attempt: AnalysisRun,
    status_log: Vec<String>,
    snapshot: &'a watch::Sender<RunSnapshot>,
}

impl RunProgress<'_> {
    fn advance(&mut self, event: RunEvent) {
        let result = self.machine.apply(event);
        Self::check(result);
    }

    fn decide(&mut self, matches: bool) -> Decision {
        let decision = self.machine.verdict(matches);
        Self::check(decision).unwrap_or(Decision::Complete)
    }

    fn check<T>(result: Result<T, TransitionError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                debug_assert!(false, "orchestrator drove an invalid transition: {}", err);
                tracing::error!(%err, "invalid run transition");
                None
            }
        }
    }

    fn status(&mut self, status: &str) {
        self.status_log.push(status.to_string());
        self.snapshot.send_replace(RunSnapshot {
            state: self.machine.state(),
            attempt: Some(self.attempt.attempt),
            effective_prompt: Some(self.attempt.effective_prompt.clone()),
            status: Some(status.to_string()),
            status_log: self.status_log.clone(),
        });
    }

    fn fail(&mut self, err: RunError) -> RunError {
        self.advance(RunEvent::ServiceFailed);
        self.status(STATUS_FAILED);
        tracing::warn!(
            attempt = %self.attempt.attempt,
            kind = err.kind().name(),
            "refinement run failed"
        );
        err
    }
}

impl Drop for RunProgress<'_> {
    fn drop(&mut self) {
        if !self.machine.state().is_active() {
            return;
        }
        self.advance(RunEvent::Cancelled);
        self.status(STATUS_CANCELLED);
        tracing::warn!(attempt = %self.attempt.attempt, "refinement run cancelled");
    }
}

/// Drives one generate-verify-retry run at a time.
///
/// ```rust,no_run
/// # async fn demo<G, A>(generator: G, analyzer: A)
/// # where G: ir_core::ImageGenerationService, A: ir_core::ImageAnalysisService {
/// use ir_refine::Orchestrator;
///
/// let orchestrator = Orchestrator::new(generator, analyzer);
/// match orchestrator.run("a red circle on a white background").await {
///     Ok(result) => println!("{} after {} attempt(s)", result.verdict.reason, result.attempts),
///     Err(err) => eprintln!("{}", err),
/// }
/// # }
/// ```
pub struct Orchestrator<G, A> {
    generator: G,
    analyzer: A,
    active: AtomicBool,
    snapshot: watch::Sender<RunSnapshot>,
}

impl<G, A> Orchestrator<G, A>
where
    G: ImageGenerationService,
    A: ImageAnalysisService,
{
    pub fn new(generator: G, analyzer: A) -> Self {
        let (snapshot, _) = watch::channel(RunSnapshot::idle());
        Self {
            generator,
            analyzer,
            active: AtomicBool::new(false),
            snapshot,
        }
    }

    /// Latest published snapshot.
    pub fn state(&self) -> RunSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot.subscribe()
    }

    /// Whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Run the loop for `prompt`.
    ///
    /// Rejected without any service call when the prompt is empty or another
    /// run is in flight.
    pub async fn run(&self, prompt: &str) -> Result<RunResult, RunError> {
        let prompt = Prompt::new(prompt).map_err(|err| {
            RunError::InvalidInput(UserFacingError::new(
                ErrorKind::InvalidInput,
                err.to_string(),
                GENERATION_CONTEXT,
            ))
        })?;

        let Some(_active) = ActiveRun::acquire(&self.active) else {
            tracing::debug!("rejecting run while another is in flight");
            return Err(RunError::RunInProgress(UserFacingError::new(
                ErrorKind::RunInProgress,
                RUN_IN_PROGRESS_MESSAGE,
                GENERATION_CONTEXT,
            )));
        };

        // Declared after `_active` so it drops first: the terminal snapshot
        // is published while the flag is still held.
        let mut progress = RunProgress {
            machine: RunMachine::new(),
            attempt: AnalysisRun::new(AttemptNumber::First, prompt.as_str()),
            status_log: Vec::new(),
            snapshot: &self.snapshot,
        };
        progress.advance(RunEvent::Start);

        loop {
            let generating = if progress.attempt.attempt.is_retry() {
                STATUS_GENERATING_REFINED
            } else {
                STATUS_GENERATING_INITIAL
            };
            progress.status(generating);

            let generated = self
                .generator
                .generate(&progress.attempt.effective_prompt, &GenerateOptions::default())
                .await;
            let image = match generated {
                Ok(image) if !image.is_empty() => image,
                Ok(_) => {
                    let user = UserFacingError::new(ErrorKind::Other, NO_IMAGE_MESSAGE, GENERATION_CONTEXT);
                    return Err(progress.fail(RunError::Generation {
                        user,
                        source: Box::new(EmptyImage),
                    }));
                }
                Err(source) => {
                    let user = normalize(source.as_ref(), GENERATION_CONTEXT);
                    return Err(progress.fail(RunError::Generation { user, source }));
                }
            };

            progress.advance(RunEvent::ImageGenerated);
            progress.status(STATUS_ANALYZING);

            let verdict = match self.analyzer.analyze(&image, prompt.as_str()).await {
                Ok(verdict) => verdict,
                Err(source) => {
                    let user = normalize_analysis_failure(&source, ANALYSIS_CONTEXT);
                    return Err(progress.fail(RunError::Analysis { user, source }));
                }
            };

            match progress.decide(verdict.matches) {
                Decision::Complete => {
                    progress.status(if verdict.matches {
                        STATUS_MATCHED
                    } else {
                        STATUS_MISMATCH_AFTER_RETRY
                    });
                    debug_assert_eq!(progress.machine.state(), RunState::Completed);
                    tracing::info!(
                        attempts = %progress.attempt.attempt,
                        matches = verdict.matches,
                        "refinement run completed"
                    );
                    return Ok(RunResult {
                        image,
                        verdict,
                        attempts: progress.attempt.attempt,
                        status_log: std::mem::take(&mut progress.status_log),
                    });
                }
                Decision::Retry(next) => {
                    progress.status(STATUS_RETRYING);
                    tracing::debug!(reason = %verdict.reason, "first image mismatched, refining prompt");

                    let refined = PromptBuilder::refined_prompt(prompt.as_str(), &verdict.reason);
                    progress.attempt = AnalysisRun::new(next, refined);
                    progress.advance(RunEvent::Retry);
                }
            }
        }
    }
}
