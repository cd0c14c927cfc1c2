//! Offline backend for the CLI.
//!
//! Generation renders a solid-colour PNG whose colour comes from a SHA-256 of
//! the prompt; analysis and faults come from the seeded simulation in
//! `ir-dst`. Nothing touches the network.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use ir_core::{AspectRatio, BoxError, ImageData};
use ir_dst::{ImageRenderer, SimAnalysisBackend, SimEnv, SimImageService};
use sha2::{Digest, Sha256};

use crate::config::DryRunConfig;
use crate::prompt::TextAnalyzer;

/// Long side of rendered images, in pixels.
pub const LONG_SIDE_PX: u32 = 256;

/// Renders prompts as solid-colour PNGs.
#[derive(Debug, Clone, Copy)]
pub struct PngRenderer {
    seed: u64,
    long_side: u32,
}

impl PngRenderer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            long_side: LONG_SIDE_PX,
        }
    }
}

impl ImageRenderer for PngRenderer {
    fn render(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<ImageData, BoxError> {
        let (width, height) = aspect_ratio.dimensions(self.long_side);
        let (r, g, b) = color_from_prompt(prompt, self.seed);
        let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));

        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(ImageData::png(bytes))
    }
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

/// The three collaborators, wired over one seeded simulation.
pub struct DryRunBackend {
    pub images: Arc<SimImageService<PngRenderer>>,
    pub analyzer: TextAnalyzer<SimAnalysisBackend>,
    seed: u64,
}

impl DryRunBackend {
    pub fn new(config: &DryRunConfig) -> Self {
        let mut env = SimEnv::new(config.seed, config.sim_config());
        let images = Arc::new(env.image_service_with(PngRenderer::new(config.seed)));
        let analyzer = TextAnalyzer::new(env.analysis_backend());
        tracing::debug!(seed = config.seed, "dry-run backend ready");
        Self {
            images,
            analyzer,
            seed: config.seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_png_dimensions() {
        let renderer = PngRenderer::new(1);
        let data = renderer.render("a lighthouse", AspectRatio::Landscape16x9).unwrap();
        assert_eq!(data.mime_type(), "image/png");

        let decoded = image::load_from_memory_with_format(data.bytes(), ImageFormat::Png).unwrap();
        assert_eq!(
            (decoded.width(), decoded.height()),
            AspectRatio::Landscape16x9.dimensions(LONG_SIDE_PX)
        );
    }

    #[test]
    fn test_color_depends_on_prompt_and_seed() {
        assert_eq!(color_from_prompt("a", 1), color_from_prompt("a", 1));
        assert_ne!(color_from_prompt("a", 1), color_from_prompt("b", 1));
        assert_ne!(color_from_prompt("a", 1), color_from_prompt("a", 2));
    }
}
