//! CLI for the refinement loop and the standalone studio operations.
//!
//! # Usage
//!
//! ```bash
//! # Generate, verify and retry once on mismatch
//! cargo run -p ir-refine -- refine "a red circle on a white background" --out circle.png
//!
//! # Reproduce a run
//! cargo run -p ir-refine -- --seed 7 refine "a red circle"
//!
//! # Standalone generation and editing
//! cargo run -p ir-refine -- generate "a lighthouse at dusk" --aspect-ratio 16:9 --out lighthouse.png
//! cargo run -p ir-refine -- edit lighthouse.png "add a full moon" --out edited.png
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ir_core::{AspectRatio, ImageData, RunError};
use ir_refine::{init_logging, DryRunBackend, Orchestrator, RefineConfig, Studio, StudioError};

#[derive(Parser, Debug)]
#[command(
    name = "ir-refine",
    version,
    about = "Generate an image, verify it against the prompt, retry once if it does not match"
)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Seed for the dry-run backend (overrides the config)
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the generate-verify-retry loop
    Refine(RefineArgs),
    /// Generate a single image
    Generate(GenerateArgs),
    /// Edit an existing image with an instruction
    Edit(EditArgs),
}

#[derive(Args, Debug)]
struct RefineArgs {
    prompt: String,
    /// Write the final image here
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    prompt: String,
    /// One of 1:1, 3:4, 4:3, 9:16, 16:9
    #[arg(long)]
    aspect_ratio: Option<AspectRatio>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EditArgs {
    image: PathBuf,
    instruction: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_filter);

    match execute(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Run and studio errors print only their normalized message.
            if let Some(run) = err.downcast_ref::<RunError>() {
                eprintln!("Error: {}", run.message());
            } else if let Some(studio) = err.downcast_ref::<StudioError>() {
                eprintln!("Error: {}", studio.message());
            } else {
                eprintln!("Error: {:#}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<RefineConfig> {
    let mut config = RefineConfig::load_or_default(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.dryrun.seed = seed;
        config.validate()?;
    }
    Ok(config)
}

async fn execute(command: Commands, config: &RefineConfig) -> Result<()> {
    let backend = DryRunBackend::new(&config.dryrun);
    tracing::info!(seed = backend.seed(), "using dry-run backend");

    match command {
        Commands::Refine(args) => {
            let orchestrator = Orchestrator::new(backend.images.clone(), backend.analyzer);

            let outcome = orchestrator.run(&args.prompt).await;
            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    for status in &orchestrator.state().status_log {
                        println!("{}", status);
                    }
                    return Err(err.into());
                }
            };

            for status in &result.status_log {
                println!("{}", status);
            }
            println!(
                "Verdict: {} ({})",
                if result.verdict.matches { "match" } else { "mismatch" },
                result.verdict.reason
            );
            println!("Attempts: {}", result.attempts);
            write_image(&result.image, args.out.as_deref()).await
        }
        Commands::Generate(args) => {
            let studio = Studio::new(backend.images.clone(), backend.images.clone());
            let aspect_ratio = args.aspect_ratio.unwrap_or(config.generate.aspect_ratio);
            let image = studio.generate(&args.prompt, aspect_ratio).await?;
            write_image(&image, args.out.as_deref()).await
        }
        Commands::Edit(args) => {
            let bytes = tokio::fs::read(&args.image)
                .await
                .with_context(|| format!("failed to read {}", args.image.display()))?;
            let mime_type = mime_for_path(&args.image).unwrap_or("application/octet-stream");
            let original = ImageData::new(bytes, mime_type);

            let studio = Studio::new(backend.images.clone(), backend.images.clone());
            let edited = studio.edit(&original, &args.instruction).await?;
            write_image(&edited, args.out.as_deref()).await
        }
    }
}

async fn write_image(image: &ImageData, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            tokio::fs::write(path, image.bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} ({} bytes)", path.display(), image.len());
        }
        None => println!("Image: {} bytes ({})", image.len(), image.mime_type()),
    }
    Ok(())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
