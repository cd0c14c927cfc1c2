//! Standalone generation and editing, outside the refinement loop.

use ir_core::{
    normalize, AspectRatio, GenerateOptions, ImageData, ImageEditService, ImageGenerationService,
    Prompt,
};

use crate::error::{EmptyImage, StudioError};

pub const GENERATE_CONTEXT: &str = "image generation";
pub const EDIT_CONTEXT: &str = "image editing";

pub const NO_IMAGE_MESSAGE: &str = "The model did not return an image. Please try a different prompt.";
pub const NO_EDITED_IMAGE_MESSAGE: &str =
    "The model did not return an image for this edit. Please try a different prompt.";
pub const NO_UPLOAD_MESSAGE: &str = "Please upload an image first.";
pub const INVALID_FILE_MESSAGE: &str =
    "Invalid file type. Please upload an image file (e.g., PNG, JPG, WEBP).";
pub const EMPTY_INSTRUCTION_MESSAGE: &str = "Please enter an editing prompt.";

/// One-shot generation and editing over the same services the orchestrator uses.
pub struct Studio<G, E> {
    generator: G,
    editor: E,
}

impl<G, E> Studio<G, E>
where
    G: ImageGenerationService,
    E: ImageEditService,
{
    pub fn new(generator: G, editor: E) -> Self {
        Self { generator, editor }
    }

    pub async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<ImageData, StudioError> {
        let prompt =
            Prompt::new(prompt).map_err(|err| StudioError::invalid_input(err.to_string(), GENERATE_CONTEXT))?;

        let options = GenerateOptions::with_aspect_ratio(aspect_ratio);
        let image = self
            .generator
            .generate(prompt.as_str(), &options)
            .await
            .map_err(|source| StudioError::Service {
                user: normalize(source.as_ref(), GENERATE_CONTEXT),
                source,
            })?;

        non_empty(image, NO_IMAGE_MESSAGE, GENERATE_CONTEXT)
    }

    pub async fn edit(&self, image: &ImageData, instruction: &str) -> Result<ImageData, StudioError> {
        if image.is_empty() {
            return Err(StudioError::invalid_input(NO_UPLOAD_MESSAGE, EDIT_CONTEXT));
        }
        if !image.is_image() {
            return Err(StudioError::invalid_input(INVALID_FILE_MESSAGE, EDIT_CONTEXT));
        }
        if instruction.is_empty() {
            return Err(StudioError::invalid_input(EMPTY_INSTRUCTION_MESSAGE, EDIT_CONTEXT));
        }

        let edited = self
            .editor
            .edit(image, instruction)
            .await
            .map_err(|source| StudioError::Service {
                user: normalize(source.as_ref(), EDIT_CONTEXT),
                source,
            })?;

        non_empty(edited, NO_EDITED_IMAGE_MESSAGE, EDIT_CONTEXT)
    }
}

fn non_empty(image: ImageData, message: &str, context: &str) -> Result<ImageData, StudioError> {
    if image.is_empty() {
        tracing::warn!(context, "service returned no image");
        return Err(StudioError::Service {
            user: ir_core::UserFacingError::new(ir_core::ErrorKind::Other, message, context),
            source: Box::new(EmptyImage),
        });
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_core::ErrorKind;
    use ir_dst::{ScriptedEditor, ScriptedGenerator};

    #[tokio::test]
    async fn test_generate_passes_aspect_ratio() {
        let studio = Studio::new(
            ScriptedGenerator::new().then_image(ImageData::png(vec![4, 2])),
            ScriptedEditor::new(),
        );
        let image = studio.generate("a lighthouse", AspectRatio::Landscape16x9).await.unwrap();
        assert_eq!(image.bytes(), &[4, 2]);
        assert_eq!(
            studio.generator.calls(),
            vec![("a lighthouse".to_string(), GenerateOptions::with_aspect_ratio(AspectRatio::Landscape16x9))]
        );
    }

    #[tokio::test]
    async fn test_generate_normalizes_errors() {
        let studio = Studio::new(
            ScriptedGenerator::new().then_error("Request blocked: SAFETY").then_image(ImageData::png(Vec::new())),
            ScriptedEditor::new(),
        );
        let err = studio.generate("x", AspectRatio::Square).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SafetyBlocked);
        assert_eq!(err.user_facing().context, GENERATE_CONTEXT);

        let err = studio.generate("x", AspectRatio::Square).await.unwrap_err();
        assert_eq!(err.message(), NO_IMAGE_MESSAGE);
    }

    #[tokio::test]
    async fn test_edit_validates_input() {
        let studio = Studio::new(ScriptedGenerator::new(), ScriptedEditor::new());

        let empty = ImageData::png(Vec::new());
        let err = studio.edit(&empty, "add a hat").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), NO_UPLOAD_MESSAGE);

        let pdf = ImageData::new(vec![1], "application/pdf");
        let err = studio.edit(&pdf, "make it blue").await.unwrap_err();
        assert_eq!(err.message(), INVALID_FILE_MESSAGE);

        let png = ImageData::png(vec![1]);
        let err = studio.edit(&png, "").await.unwrap_err();
        assert_eq!(err.message(), EMPTY_INSTRUCTION_MESSAGE);
        assert_eq!(studio.editor.calls_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_results() {
        let studio = Studio::new(
            ScriptedGenerator::new(),
            ScriptedEditor::new()
                .then_image(ImageData::png(vec![7]))
                .then_image(ImageData::png(Vec::new()))
                .then_error("[500 Internal Server Error]"),
        );
        let png = ImageData::png(vec![1]);

        assert_eq!(studio.edit(&png, "add a hat").await.unwrap().bytes(), &[7]);
        assert_eq!(studio.edit(&png, "add a hat").await.unwrap_err().message(), NO_EDITED_IMAGE_MESSAGE);
        let err = studio.edit(&png, "add a hat").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.user_facing().context, EDIT_CONTEXT);
        assert_eq!(studio.editor.instructions(), vec!["add a hat"; 3]);
    }
}
