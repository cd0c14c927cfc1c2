//! Scripted services: each call pops the next queued response.
//!
//! Used where a test needs an exact sequence of outcomes rather than a seeded
//! distribution. Every call is logged so tests can assert on what the caller
//! sent.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use ir_core::{
    AnalysisFailure, BoxError, GenerateOptions, ImageAnalysisService, ImageData, ImageEditService,
    ImageGenerationService, Verdict,
};

const EXHAUSTED: &str = "scripted service has no responses left";

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().ok().and_then(|mut q| q.pop_front())
}

fn push<T>(log: &Mutex<Vec<T>>, entry: T) {
    if let Ok(mut log) = log.lock() {
        log.push(entry);
    }
}

fn snapshot<T: Clone>(log: &Mutex<Vec<T>>) -> Vec<T> {
    log.lock().map(|log| log.clone()).unwrap_or_default()
}

/// Error type carried by scripted failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ScriptedError(pub String);

fn scripted_error(message: impl Into<String>) -> BoxError {
    Box::new(ScriptedError(message.into()))
}

/// Generation service returning queued images or errors.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<ImageData, String>>>,
    calls: Mutex<Vec<(String, GenerateOptions)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful generation.
    pub fn then_image(self, image: ImageData) -> Self {
        self.enqueue(Ok(image))
    }

    /// Queue a failed generation with the given raw message.
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.enqueue(Err(message.into()))
    }

    fn enqueue(self, response: Result<ImageData, String>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        snapshot(&self.calls).into_iter().map(|(prompt, _)| prompt).collect()
    }

    pub fn calls(&self) -> Vec<(String, GenerateOptions)> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl ImageGenerationService for ScriptedGenerator {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<ImageData, BoxError> {
        push(&self.calls, (prompt.to_string(), *options));
        match pop(&self.responses) {
            Some(Ok(image)) => Ok(image),
            Some(Err(message)) => Err(scripted_error(message)),
            None => Err(scripted_error(EXHAUSTED)),
        }
    }
}

/// One queued analysis outcome.
#[derive(Debug, Clone)]
pub enum ScriptedAnalysis {
    Verdict(Verdict),
    Error(String),
    /// Model text that fails verdict decoding
    Malformed(String),
}

/// Analysis service returning queued verdicts or failures.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    responses: Mutex<VecDeque<ScriptedAnalysis>>,
    calls: Mutex<Vec<(ImageData, String)>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_match(self, reason: impl Into<String>) -> Self {
        self.enqueue(ScriptedAnalysis::Verdict(Verdict::matched(reason)))
    }

    pub fn then_mismatch(self, reason: impl Into<String>) -> Self {
        self.enqueue(ScriptedAnalysis::Verdict(Verdict::mismatched(reason)))
    }

    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.enqueue(ScriptedAnalysis::Error(message.into()))
    }

    pub fn then_malformed(self, text: impl Into<String>) -> Self {
        self.enqueue(ScriptedAnalysis::Malformed(text.into()))
    }

    fn enqueue(self, response: ScriptedAnalysis) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Prompts the analyzer was asked to judge against, in call order.
    pub fn prompts(&self) -> Vec<String> {
        snapshot(&self.calls).into_iter().map(|(_, prompt)| prompt).collect()
    }

    /// Images the analyzer was shown, in call order.
    pub fn images(&self) -> Vec<ImageData> {
        snapshot(&self.calls).into_iter().map(|(image, _)| image).collect()
    }
}

#[async_trait]
impl ImageAnalysisService for ScriptedAnalyzer {
    async fn analyze(&self, image: &ImageData, prompt: &str) -> Result<Verdict, AnalysisFailure> {
        push(&self.calls, (image.clone(), prompt.to_string()));
        match pop(&self.responses) {
            Some(ScriptedAnalysis::Verdict(verdict)) => Ok(verdict),
            Some(ScriptedAnalysis::Error(message)) => Err(AnalysisFailure::service(ScriptedError(message))),
            Some(ScriptedAnalysis::Malformed(text)) => match Verdict::from_json(&text) {
                Err(err) => Err(AnalysisFailure::from(err)),
                Ok(_) => Err(AnalysisFailure::service(ScriptedError(format!(
                    "expected malformed text, got {}",
                    text
                )))),
            },
            None => Err(AnalysisFailure::service(ScriptedError(EXHAUSTED.to_string()))),
        }
    }
}

/// Edit service returning queued images or errors.
#[derive(Debug, Default)]
pub struct ScriptedEditor {
    responses: Mutex<VecDeque<Result<ImageData, String>>>,
    calls: Mutex<Vec<(ImageData, String)>>,
}

impl ScriptedEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_image(self, image: ImageData) -> Self {
        self.enqueue(Ok(image))
    }

    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.enqueue(Err(message.into()))
    }

    fn enqueue(self, response: Result<ImageData, String>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    pub fn calls_count(&self) -> usize {
        snapshot(&self.calls).len()
    }

    pub fn instructions(&self) -> Vec<String> {
        snapshot(&self.calls).into_iter().map(|(_, instruction)| instruction).collect()
    }
}

#[async_trait]
impl ImageEditService for ScriptedEditor {
    async fn edit(&self, image: &ImageData, instruction: &str) -> Result<ImageData, BoxError> {
        push(&self.calls, (image.clone(), instruction.to_string()));
        match pop(&self.responses) {
            Some(Ok(image)) => Ok(image),
            Some(Err(message)) => Err(scripted_error(message)),
            None => Err(scripted_error(EXHAUSTED)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generator_pops_in_order() {
        let generator = ScriptedGenerator::new()
            .then_image(ImageData::png(vec![1]))
            .then_error("[503] overloaded");

        let first = generator.generate("one", &GenerateOptions::default()).await.unwrap();
        assert_eq!(first.bytes(), &[1]);
        let second = generator.generate("two", &GenerateOptions::default()).await.unwrap_err();
        assert_eq!(second.to_string(), "[503] overloaded");
        let third = generator.generate("three", &GenerateOptions::default()).await.unwrap_err();
        assert_eq!(third.to_string(), EXHAUSTED);
        assert_eq!(generator.prompts(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_analyzer_malformed_is_invalid_response() {
        let analyzer = ScriptedAnalyzer::new().then_malformed("not json");
        let image = ImageData::png(vec![9]);
        let err = analyzer.analyze(&image, "a cat").await.unwrap_err();
        assert!(matches!(err, AnalysisFailure::InvalidResponse(_)));
        assert_eq!(analyzer.prompts(), vec!["a cat"]);
        assert_eq!(analyzer.images(), vec![image]);
    }
}
