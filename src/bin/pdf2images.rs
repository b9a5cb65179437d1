use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use catalog_image_extract::{
    ConfigUpdateOutcome, DEFAULT_MAX_VERTICAL_GAP, DEFAULT_MIN_OVERLAP_RATIO, ExtractOptions,
    ExtractionReport, ImageSuffix, RunConfig, Target, category_image_map, clean_existing_images,
    extract_catalog_images, prompt_target, read_manifest, update_category_config,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pdf2images",
    version,
    about = "Extract product images from a catalog PDF, named after their captions"
)]
struct Cli {
    /// Input catalog PDF.
    pdf: PathBuf,

    /// Extension for saved images (bytes are written unchanged).
    #[arg(long, default_value = "png")]
    format: ImageSuffix,

    /// Also zip the output folder next to it.
    #[arg(long)]
    zip: bool,

    /// Maximum vertical distance between an image and its caption.
    #[arg(long = "max-gap", alias = "max_gap", default_value_t = DEFAULT_MAX_VERTICAL_GAP)]
    max_gap: f32,

    /// Minimum horizontal overlap, as a fraction of image width.
    #[arg(
        long = "min-overlap-ratio",
        alias = "min_overlap_ratio",
        default_value_t = DEFAULT_MIN_OVERLAP_RATIO
    )]
    min_overlap_ratio: f32,

    /// Log caption candidates for the first page.
    #[arg(long)]
    debug: bool,

    /// Project root holding `public/` and `src/config/colleges/`.
    #[arg(long, default_value = ".")]
    project_root: PathBuf,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "catalog_image_extract={default_level},pdf2images={default_level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn print_summary(report: &ExtractionReport, output_dir: &Path) {
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!("Saved {} images to {}", report.saved_count, output_dir.display());
    println!("Skipped {} duplicate images", report.duplicate_count);
    if report.fallback_caption_count > 0 {
        println!(
            "{} images had no caption and were named by page and index",
            report.fallback_caption_count
        );
    }
    println!("Output: {}", report.output_path().display());
    println!("{rule}");
}

fn update_config(config: &RunConfig, report: &ExtractionReport) -> Result<()> {
    let rows = read_manifest(&report.manifest_path).with_context(|| {
        format!("failed to read manifest '{}'", report.manifest_path.display())
    })?;
    let mapping = category_image_map(&rows);

    let outcome = update_category_config(&config.config_path, &mapping).with_context(|| {
        format!("failed to update config '{}'", config.config_path.display())
    })?;
    match outcome {
        ConfigUpdateOutcome::Updated(summary) => {
            println!(
                "Updated {} with {} categories ({} images)",
                summary.config_path.display(),
                summary.updated_categories,
                summary.total_images
            );
            for name in &summary.created_categories {
                println!("  new category: {name}");
            }
        }
        ConfigUpdateOutcome::Skipped { config_path } => {
            println!("Config {} not found; skipped update", config_path.display());
        }
    }
    Ok(())
}

fn run(target: &Target, cli: Cli) -> Result<()> {
    let options = ExtractOptions {
        image_suffix: cli.format,
        archive: cli.zip,
        max_vertical_gap: cli.max_gap,
        min_overlap_ratio: cli.min_overlap_ratio,
        debug: cli.debug,
    };
    let config = RunConfig::resolve(&cli.project_root, target, cli.pdf, options);
    info!(college = target.label, output = %config.output_dir.display(), "selected target");

    let removed = clean_existing_images(&config.output_dir).with_context(|| {
        format!("failed to clean '{}'", config.output_dir.display())
    })?;
    info!(removed, "cleaned previous images");

    let report =
        extract_catalog_images(&config.pdf_path, &config.output_dir, config.options.clone())
            .with_context(|| {
                format!("failed to extract images from '{}'", config.pdf_path.display())
            })?;
    print_summary(&report, &config.output_dir);

    update_config(&config, &report)
}

fn main() -> ExitCode {
    let stdin = io::stdin();
    let target = match prompt_target(&mut stdin.lock(), &mut io::stdout()) {
        Ok(target) => target,
        Err(error) => {
            eprintln!("error: {error:#}");
            return ExitCode::from(1);
        }
    };

    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(target, cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
