//! Run properties checked against recorded traces.
//!
//! A [`RunTrace`] records the service calls a run made and how it ended.
//! Simulation tests record one trace per run and check it here, so the same
//! properties hold whichever collaborator drove the run.

use crate::verdict::Verdict;

/// Result of checking a single property.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name (e.g., "BoundedAttempts")
    pub name: &'static str,

    /// Whether the property holds
    pub holds: bool,

    /// Description of violation if property doesn't hold
    pub violation: Option<String>,
}

impl PropertyResult {
    /// Create a passing property result.
    #[must_use]
    pub fn pass(name: &'static str) -> Self {
        debug_assert!(!name.is_empty(), "Property name must not be empty");

        Self {
            name,
            holds: true,
            violation: None,
        }
    }

    /// Create a failing property result.
    #[must_use]
    pub fn fail(name: &'static str, violation: String) -> Self {
        debug_assert!(!name.is_empty(), "Property name must not be empty");
        debug_assert!(!violation.is_empty(), "Violation description must not be empty");

        Self {
            name,
            holds: false,
            violation: Some(violation),
        }
    }

    /// Pass when `holds`, otherwise fail with the lazily built violation.
    fn check(name: &'static str, holds: bool, violation: impl FnOnce() -> String) -> Self {
        if holds {
            Self::pass(name)
        } else {
            Self::fail(name, violation())
        }
    }

    /// Format as a single-line status for logging.
    #[must_use]
    pub fn format_status(&self) -> String {
        if self.holds {
            format!("[PASS] {}", self.name)
        } else {
            format!(
                "[FAIL] {}: {}",
                self.name,
                self.violation.as_deref().unwrap_or("unknown")
            )
        }
    }
}

/// Trait for verifying properties against recorded behaviour.
pub trait PropertyChecker {
    /// Check all properties and return results, passing ones included.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// Verify all properties, returning the first failure.
    fn verify_all(&self) -> Result<(), PropertyResult> {
        for result in self.check_all() {
            if !result.holds {
                return Err(result);
            }
        }
        Ok(())
    }

    /// Check if all properties hold.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Get a summary of all property check results.
    fn summary(&self) -> PropertySummary {
        let results = self.check_all();
        let passed = results.iter().filter(|r| r.holds).count() as u64;
        let failed = results.iter().filter(|r| !r.holds).count() as u64;
        let total = results.len() as u64;

        debug_assert!(passed + failed == total);

        PropertySummary {
            passed,
            failed,
            total,
            results,
        }
    }
}

/// Summary of property check results.
#[derive(Debug, Clone)]
pub struct PropertySummary {
    pub passed: u64,
    pub failed: u64,
    pub total: u64,
    pub results: Vec<PropertyResult>,
}

impl PropertySummary {
    /// Format as a report string.
    #[must_use]
    pub fn format_report(&self) -> String {
        let mut report = format!(
            "Property Check Summary: {}/{} passed\n",
            self.passed, self.total
        );

        for result in &self.results {
            report.push_str(&result.format_status());
            report.push('\n');
        }

        report
    }
}

/// A service call observed during a run, with what it returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// Generation was asked for `prompt`; `succeeded` is false on error or empty image
    Generate { prompt: String, succeeded: bool },
    /// Analysis was asked about `prompt`; `verdict` is None on error
    Analyze { prompt: String, verdict: Option<Verdict> },
}

/// How a recorded run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    /// Result returned with this verdict after `attempts` attempts
    Completed { attempts: u8, verdict: Verdict },
    /// A service error ended the run
    Failed,
    /// Rejected before any call (invalid input or busy)
    Rejected,
}

/// Calls and outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTrace {
    /// The prompt the caller submitted
    pub prompt: String,
    pub calls: Vec<ServiceCall>,
    pub outcome: TraceOutcome,
}

impl RunTrace {
    fn generate_prompts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::Generate { prompt, .. } => Some(prompt.as_str()),
                ServiceCall::Analyze { .. } => None,
            })
            .collect()
    }

    fn analyses(&self) -> Vec<(&str, Option<&Verdict>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::Analyze { prompt, verdict } => Some((prompt.as_str(), verdict.as_ref())),
                ServiceCall::Generate { .. } => None,
            })
            .collect()
    }

    fn first_verdict(&self) -> Option<&Verdict> {
        self.analyses().first().and_then(|(_, verdict)| *verdict)
    }

    fn call_failed(call: &ServiceCall) -> bool {
        match call {
            ServiceCall::Generate { succeeded, .. } => !succeeded,
            ServiceCall::Analyze { verdict, .. } => verdict.is_none(),
        }
    }

    /// At most two generations and two analyses.
    pub fn bounded_attempts(&self) -> PropertyResult {
        let generations = self.generate_prompts().len();
        let analyses = self.analyses().len();
        PropertyResult::check("BoundedAttempts", generations <= 2 && analyses <= 2, || {
            format!("{} generations and {} analyses", generations, analyses)
        })
    }

    /// Analysis always judges against the caller's prompt.
    pub fn analysis_uses_original_prompt(&self) -> PropertyResult {
        let stray = self
            .analyses()
            .into_iter()
            .find(|(prompt, _)| *prompt != self.prompt)
            .map(|(prompt, _)| prompt.to_string());
        PropertyResult::check("AnalysisUsesOriginalPrompt", stray.is_none(), || {
            format!("analysis judged against {:?}", stray.unwrap_or_default())
        })
    }

    /// The first generation uses the caller's prompt unchanged.
    pub fn first_generation_uses_original_prompt(&self) -> PropertyResult {
        let first = self.generate_prompts().first().map(|p| p.to_string());
        let holds = first.as_deref().map_or(true, |p| p == self.prompt);
        PropertyResult::check("FirstGenerationUsesOriginalPrompt", holds, || {
            format!("first generation prompt was {:?}", first.unwrap_or_default())
        })
    }

    /// A second generation happens if and only if the first verdict was a mismatch.
    pub fn retry_iff_mismatch(&self) -> PropertyResult {
        let retried = self.generate_prompts().len() >= 2;
        let mismatched = self.first_verdict().map_or(false, |v| !v.matches);
        PropertyResult::check("RetryIffMismatch", retried == mismatched, || {
            format!("retried={} but first verdict mismatched={}", retried, mismatched)
        })
    }

    /// The retry prompt embeds the caller's prompt and the first mismatch reason.
    pub fn refined_prompt_embeds_reason(&self) -> PropertyResult {
        let prompts = self.generate_prompts();
        let (Some(refined), Some(verdict)) = (prompts.get(1), self.first_verdict()) else {
            return PropertyResult::pass("RefinedPromptEmbedsReason");
        };
        let holds = refined.contains(self.prompt.as_str()) && refined.contains(verdict.reason.as_str());
        PropertyResult::check("RefinedPromptEmbedsReason", holds, || {
            format!("refined prompt {:?} misses prompt or reason {:?}", refined, verdict.reason)
        })
    }

    /// No call follows a failed call.
    pub fn stops_after_failure(&self) -> PropertyResult {
        let failed_at = self.calls.iter().position(Self::call_failed);
        let holds = failed_at.map_or(true, |idx| idx + 1 == self.calls.len());
        PropertyResult::check("StopsAfterFailure", holds, || {
            format!(
                "call {} failed but {} calls were made",
                failed_at.unwrap_or_default(),
                self.calls.len()
            )
        })
    }

    /// The outcome agrees with the calls that were made.
    pub fn outcome_matches_calls(&self) -> PropertyResult {
        let generations = self.generate_prompts().len();
        let last_failed = self.calls.last().map_or(false, Self::call_failed);
        let last_verdict = self.analyses().last().and_then(|(_, v)| v.cloned());

        let holds = match &self.outcome {
            TraceOutcome::Rejected => self.calls.is_empty(),
            TraceOutcome::Failed => last_failed,
            TraceOutcome::Completed { attempts, verdict } => {
                !last_failed
                    && usize::from(*attempts) == generations
                    && last_verdict.as_ref() == Some(verdict)
            }
        };
        PropertyResult::check("OutcomeMatchesCalls", holds, || {
            format!("outcome {:?} after {} calls", self.outcome, self.calls.len())
        })
    }
}

impl PropertyChecker for RunTrace {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.bounded_attempts(),
            self.analysis_uses_original_prompt(),
            self.first_generation_uses_original_prompt(),
            self.retry_iff_mismatch(),
            self.refined_prompt_embeds_reason(),
            self.stops_after_failure(),
            self.outcome_matches_calls(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(prompt: &str) -> ServiceCall {
        ServiceCall::Generate {
            prompt: prompt.to_string(),
            succeeded: true,
        }
    }

    fn analyze(prompt: &str, verdict: Verdict) -> ServiceCall {
        ServiceCall::Analyze {
            prompt: prompt.to_string(),
            verdict: Some(verdict),
        }
    }

    #[test]
    fn test_retry_trace_holds() {
        let trace = RunTrace {
            prompt: "a red circle".to_string(),
            calls: vec![
                generate("a red circle"),
                analyze("a red circle", Verdict::mismatched("blue square")),
                generate("fix \"a red circle\": \"blue square\""),
                analyze("a red circle", Verdict::mismatched("still blue")),
            ],
            outcome: TraceOutcome::Completed {
                attempts: 2,
                verdict: Verdict::mismatched("still blue"),
            },
        };
        let summary = trace.summary();
        assert_eq!(summary.failed, 0, "{}", summary.format_report());
    }

    #[test]
    fn test_detects_analysis_on_refined_prompt() {
        let trace = RunTrace {
            prompt: "a sunset".to_string(),
            calls: vec![
                generate("a sunset"),
                analyze("a sunset", Verdict::mismatched("too dark")),
                generate("a sunset, too dark"),
                analyze("a sunset, too dark", Verdict::matched("ok")),
            ],
            outcome: TraceOutcome::Completed {
                attempts: 2,
                verdict: Verdict::matched("ok"),
            },
        };
        let failure = trace.verify_all().unwrap_err();
        assert_eq!(failure.name, "AnalysisUsesOriginalPrompt");
    }

    #[test]
    fn test_detects_retry_after_match() {
        let trace = RunTrace {
            prompt: "a sunset".to_string(),
            calls: vec![
                generate("a sunset"),
                analyze("a sunset", Verdict::matched("ok")),
                generate("again"),
            ],
            outcome: TraceOutcome::Failed,
        };
        assert!(!trace.retry_iff_mismatch().holds);
        assert!(!trace.all_hold());
    }

    #[test]
    fn test_failure_trace() {
        let trace = RunTrace {
            prompt: "a sunset".to_string(),
            calls: vec![ServiceCall::Generate {
                prompt: "a sunset".to_string(),
                succeeded: false,
            }],
            outcome: TraceOutcome::Failed,
        };
        assert!(trace.all_hold());

        let rejected = RunTrace {
            prompt: String::new(),
            calls: Vec::new(),
            outcome: TraceOutcome::Rejected,
        };
        assert!(rejected.all_hold());
    }

    #[test]
    fn test_format_status() {
        assert!(PropertyResult::pass("Test").format_status().contains("[PASS]"));
        let fail = PropertyResult::fail("Test", "error".to_string());
        assert_eq!(fail.format_status(), "[FAIL] Test: error");
    }
}
