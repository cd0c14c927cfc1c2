//! Prompt construction and verdict decoding.
//!
//! The refined prompt states what to fix, not how: it repeats the original
//! prompt and the analyzer's reason and asks for a closer match.

use async_trait::async_trait;
use ir_core::{
    AnalysisFailure, ImageAnalysisService, ImageData, TextAnalysisBackend, Verdict,
    VerdictDecodeError,
};

/// Builds the text sent to the generation and analysis services.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for the second attempt, after the first image was judged a mismatch.
    pub fn refined_prompt(prompt: &str, reason: &str) -> String {
        format!(
            "Original prompt: \"{prompt}\". The previous attempt was not accurate because: \"{reason}\". \
             Please generate a new image that more closely matches the original prompt, \
             paying attention to fixing the previous issues."
        )
    }

    /// Instruction sent to a multimodal model alongside the image.
    pub fn analysis_prompt(prompt: &str) -> String {
        format!(
            "Analyze the provided image and determine if it accurately represents the following user prompt. \
             Provide your response as a JSON object with two keys: \"match\" (a boolean, true if it matches, \
             false otherwise) and \"reason\" (a brief string explaining your decision). \
             Do not include any other text or markdown formatting in your response. \
             User Prompt: \"{prompt}\""
        )
    }
}

/// Remove a markdown code fence the model may wrap around its JSON.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

/// Decode model text into a verdict, tolerating a surrounding fence.
pub fn decode_verdict(text: &str) -> Result<Verdict, VerdictDecodeError> {
    Verdict::from_json(strip_code_fence(text))
}

/// Analysis service over a backend that answers in free text.
#[derive(Debug)]
pub struct TextAnalyzer<B> {
    backend: B,
}

impl<B: TextAnalysisBackend> TextAnalyzer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: TextAnalysisBackend> ImageAnalysisService for TextAnalyzer<B> {
    async fn analyze(&self, image: &ImageData, prompt: &str) -> Result<Verdict, AnalysisFailure> {
        let instruction = PromptBuilder::analysis_prompt(prompt);
        let text = self
            .backend
            .analyze_text(image, &instruction)
            .await
            .map_err(AnalysisFailure::Service)?;
        let verdict = decode_verdict(&text).map_err(|err| {
            tracing::warn!(raw = %err.raw, "analysis response did not decode");
            err
        })?;
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_core::BoxError;
    use std::sync::Mutex;

    #[test]
    fn test_refined_prompt_text() {
        let refined = PromptBuilder::refined_prompt("a red circle", "the image shows a blue square");
        assert_eq!(
            refined,
            "Original prompt: \"a red circle\". The previous attempt was not accurate because: \
             \"the image shows a blue square\". Please generate a new image that more closely \
             matches the original prompt, paying attention to fixing the previous issues."
        );
    }

    #[test]
    fn test_analysis_prompt_mentions_keys_and_prompt() {
        let text = PromptBuilder::analysis_prompt("a cat on a mat");
        assert!(text.contains("\"match\""));
        assert!(text.contains("\"reason\""));
        assert!(text.ends_with("User Prompt: \"a cat on a mat\""));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json{}```"), "{}");
    }

    #[test]
    fn test_decode_verdict_fenced() {
        let verdict = decode_verdict("```json\n{\"match\": true, \"reason\": \"looks right\"}\n```").unwrap();
        assert_eq!(verdict, Verdict::matched("looks right"));
    }

    #[test]
    fn test_decode_verdict_rejects_prose() {
        let err = decode_verdict("Yes, it matches.").unwrap_err();
        assert_eq!(err.raw, "Yes, it matches.");
        assert!(decode_verdict("{\"match\": \"yes\", \"reason\": \"x\"}").is_err());
    }

    struct FixedBackend {
        reply: Result<String, String>,
        instructions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextAnalysisBackend for FixedBackend {
        async fn analyze_text(&self, _image: &ImageData, instruction: &str) -> Result<String, BoxError> {
            self.instructions.lock().unwrap().push(instruction.to_string());
            self.reply.clone().map_err(BoxError::from)
        }
    }

    #[tokio::test]
    async fn test_text_analyzer_decodes() {
        let analyzer = TextAnalyzer::new(FixedBackend {
            reply: Ok("{\"match\": false, \"reason\": \"no moon\"}".to_string()),
            instructions: Mutex::new(Vec::new()),
        });
        let verdict = analyzer.analyze(&ImageData::png(vec![1]), "a moon").await.unwrap();
        assert_eq!(verdict, Verdict::mismatched("no moon"));
        let sent = analyzer.backend().instructions.lock().unwrap().clone();
        assert_eq!(sent, vec![PromptBuilder::analysis_prompt("a moon")]);
    }

    #[tokio::test]
    async fn test_text_analyzer_failures() {
        let garbled = TextAnalyzer::new(FixedBackend {
            reply: Ok("not json".to_string()),
            instructions: Mutex::new(Vec::new()),
        });
        let err = garbled.analyze(&ImageData::png(vec![1]), "x").await.unwrap_err();
        assert!(matches!(err, AnalysisFailure::InvalidResponse(_)));

        let failing = TextAnalyzer::new(FixedBackend {
            reply: Err("[503] unavailable".to_string()),
            instructions: Mutex::new(Vec::new()),
        });
        let err = failing.analyze(&ImageData::png(vec![1]), "x").await.unwrap_err();
        assert!(matches!(err, AnalysisFailure::Service(_)));
        assert_eq!(err.to_string(), "[503] unavailable");
    }
}
