//! The CLI's offline backend, end to end.

use ir_core::{AspectRatio, ErrorKind, ImageData};
use ir_refine::studio::{INVALID_FILE_MESSAGE, NO_UPLOAD_MESSAGE};
use ir_refine::{DryRunBackend, DryRunConfig, Orchestrator, Studio};

fn decoded_size(image: &ImageData) -> (u32, u32) {
    let decoded = image::load_from_memory(image.bytes()).unwrap();
    (decoded.width(), decoded.height())
}

#[tokio::test]
async fn test_generate_renders_png_for_aspect_ratio() {
    let backend = DryRunBackend::new(&DryRunConfig::default());
    let studio = Studio::new(backend.images.clone(), backend.images.clone());

    for aspect_ratio in AspectRatio::ALL {
        let image = studio.generate("a lighthouse at dusk", aspect_ratio).await.unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(
            decoded_size(&image),
            aspect_ratio.dimensions(ir_refine::dryrun::LONG_SIDE_PX)
        );
    }
}

#[tokio::test]
async fn test_edit_changes_image() {
    let backend = DryRunBackend::new(&DryRunConfig::default());
    let studio = Studio::new(backend.images.clone(), backend.images.clone());

    let original = studio.generate("a red barn", AspectRatio::Square).await.unwrap();
    let edited = studio.edit(&original, "paint the barn blue").await.unwrap();
    assert_ne!(original, edited);
    assert!(edited.is_image());

    let text = ImageData::new(b"hello".to_vec(), "text/plain");
    let err = studio.edit(&text, "paint the barn blue").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(err.message(), INVALID_FILE_MESSAGE);

    let empty_upload = ImageData::png(Vec::new());
    let err = studio.edit(&empty_upload, "paint the barn blue").await.unwrap_err();
    assert_eq!(err.message(), NO_UPLOAD_MESSAGE);
}

#[tokio::test]
async fn test_refine_on_dry_run_backend() {
    let config = DryRunConfig {
        mismatch_probability: 1.0,
        ..DryRunConfig::default()
    };
    let backend = DryRunBackend::new(&config);
    let orchestrator = Orchestrator::new(backend.images.clone(), backend.analyzer);

    let result = orchestrator.run("a red circle").await.unwrap();
    assert_eq!(result.attempts_count(), 2);
    assert!(!result.verdict.matches);
    assert_eq!(decoded_size(&result.image), (256, 256));
}

#[tokio::test]
async fn test_injected_faults_are_normalized() {
    let config = DryRunConfig {
        failure_probability: 1.0,
        ..DryRunConfig::default()
    };
    let backend = DryRunBackend::new(&config);
    let orchestrator = Orchestrator::new(backend.images.clone(), backend.analyzer);

    for _ in 0..30 {
        let err = orchestrator.run("a red circle").await.unwrap_err();
        assert!(!err.message().is_empty());
        assert_ne!(err.kind(), ErrorKind::InvalidInput);
        assert_ne!(err.kind(), ErrorKind::RunInProgress);
    }
}
