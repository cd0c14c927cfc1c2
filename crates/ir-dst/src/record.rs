//! Call recording for trace property checks.
//!
//! Wrap each collaborator in [`Recorded`] sharing one [`TraceRecorder`]; after
//! a run, [`TraceRecorder::finish`] yields a [`RunTrace`] to check with
//! [`ir_core::PropertyChecker`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ir_core::{
    AnalysisFailure, BoxError, GenerateOptions, ImageAnalysisService, ImageData,
    ImageGenerationService, RunError, RunResult, RunTrace, ServiceCall, TraceOutcome, Verdict,
};

/// Shared log of service calls, in the order they returned.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    calls: Arc<Mutex<Vec<ServiceCall>>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a service so its calls land in this recorder.
    pub fn wrap<S>(&self, inner: S) -> Recorded<S> {
        Recorded {
            inner,
            recorder: self.clone(),
        }
    }

    fn record(&self, call: ServiceCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Drop recorded calls so the recorder can follow another run.
    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Build the trace of the run that just returned `outcome`, then clear.
    pub fn finish(&self, prompt: &str, outcome: &Result<RunResult, RunError>) -> RunTrace {
        let outcome = match outcome {
            Ok(result) => TraceOutcome::Completed {
                attempts: result.attempts_count(),
                verdict: result.verdict.clone(),
            },
            Err(RunError::InvalidInput(_) | RunError::RunInProgress(_)) => TraceOutcome::Rejected,
            Err(RunError::Generation { .. } | RunError::Analysis { .. }) => TraceOutcome::Failed,
        };
        let trace = RunTrace {
            prompt: prompt.to_string(),
            calls: self.calls(),
            outcome,
        };
        self.clear();
        trace
    }
}

/// A service whose calls are logged to a [`TraceRecorder`].
#[derive(Debug)]
pub struct Recorded<S> {
    inner: S,
    recorder: TraceRecorder,
}

impl<S> Recorded<S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ImageGenerationService> ImageGenerationService for Recorded<S> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<ImageData, BoxError> {
        let result = self.inner.generate(prompt, options).await;
        self.recorder.record(ServiceCall::Generate {
            prompt: prompt.to_string(),
            succeeded: result.as_ref().map_or(false, |image| !image.is_empty()),
        });
        result
    }
}

#[async_trait]
impl<S: ImageAnalysisService> ImageAnalysisService for Recorded<S> {
    async fn analyze(&self, image: &ImageData, prompt: &str) -> Result<Verdict, AnalysisFailure> {
        let result = self.inner.analyze(image, prompt).await;
        self.recorder.record(ServiceCall::Analyze {
            prompt: prompt.to_string(),
            verdict: result.as_ref().ok().cloned(),
        });
        result
    }
}
