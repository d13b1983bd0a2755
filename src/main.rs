use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use image_quality::{BatchReport, PickLabel, QualityAnalyzer, QualitySettings};
use tracing_subscriber::EnvFilter;

mod scan;

#[derive(Parser)]
#[command(name = "photo-triage")]
#[command(about = "Cull photographs by blur, noise, compression and exposure")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess an image or a folder of images and assign pick labels
    Analyze {
        /// Image file or folder containing images
        #[arg(short, long)]
        path: PathBuf,

        /// JSON settings file (missing fields take their defaults)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Output results to JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a per-metric diagnostic trace to this file
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Cancel the analysis after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Quality below this value is rejected (0-100)
        #[arg(long)]
        rejected: Option<i32>,

        /// Quality at or above this value is accepted (0-100)
        #[arg(long)]
        accepted: Option<i32>,

        #[arg(long)]
        no_blur: bool,

        #[arg(long)]
        no_noise: bool,

        #[arg(long)]
        no_compression: bool,

        #[arg(long)]
        no_exposure: bool,
    },

    /// Print the default settings as JSON
    Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            path,
            settings,
            output,
            trace,
            timeout_ms,
            rejected,
            accepted,
            no_blur,
            no_noise,
            no_compression,
            no_exposure,
        } => {
            let mut settings = match settings {
                Some(file) => QualitySettings::from_json_file(&file)
                    .with_context(|| format!("Failed to load settings from {}", file.display()))?,
                None => QualitySettings::default(),
            };
            if let Some(value) = rejected {
                settings.rejected_threshold = value;
            }
            if let Some(value) = accepted {
                settings.accepted_threshold = value;
            }
            settings.detect_blur &= !no_blur;
            settings.detect_noise &= !no_noise;
            settings.detect_compression &= !no_compression;
            settings.detect_overexposure &= !no_exposure;
            settings.validate().context("Invalid quality settings")?;

            analyze(&path, settings, output, trace, timeout_ms)
        }
        Commands::Settings => {
            println!("{}", QualitySettings::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze(
    path: &Path,
    settings: QualitySettings,
    output_path: Option<PathBuf>,
    trace_path: Option<PathBuf>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    println!("🔍 Analyzing images in: {}", path.display());

    let image_paths = scan::collect_images(path)?;
    if image_paths.is_empty() {
        println!("⚠️  No supported image files found in {}", path.display());
        return Ok(());
    }
    println!("📸 Found {} image files", image_paths.len());

    let analyzer = QualityAnalyzer::new(settings);

    if let Some(ms) = timeout_ms {
        let token = analyzer.cancel_token();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            tracing::warn!("Timeout of {}ms reached, cancelling analysis", ms);
            token.cancel();
        });
    }

    let report = analyzer.analyze_batch(&image_paths);

    print_results(&report);
    if analyzer.is_cancelled() {
        println!("⏱️  Analysis cancelled before every image finished");
    }

    if let Some(trace_path) = trace_path {
        write_trace(&report, &trace_path)?;
        println!("🧾 Trace written to: {}", trace_path.display());
    }

    if let Some(output_path) = output_path {
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialize batch report to JSON")?;

        std::fs::write(&output_path, json)
            .with_context(|| format!("Failed to write output to {}", output_path.display()))?;

        println!("💾 Results saved to: {}", output_path.display());
    }

    Ok(())
}

fn label_marker(label: PickLabel) -> &'static str {
    match label {
        PickLabel::Accepted => "✅",
        PickLabel::Pending => "🤔",
        PickLabel::Rejected => "❌",
        PickLabel::NoPick => "⚪",
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_results(report: &BatchReport) {
    println!("\n📈 ANALYSIS RESULTS");
    println!("==================");

    for entry in &report.entries {
        match (&entry.report, &entry.error) {
            (Some(quality), _) => println!(
                "  {} {} ({:.1} - {})",
                label_marker(entry.label),
                display_name(&entry.path),
                quality.final_quality,
                entry.label
            ),
            (None, Some(error)) => println!(
                "  {} {} ({})",
                label_marker(entry.label),
                display_name(&entry.path),
                error
            ),
            (None, None) => println!("  {} {}", label_marker(entry.label), display_name(&entry.path)),
        }
    }

    let summary = report.summary();
    println!("\nTotal images: {}", summary.total);
    println!("Accepted: {}", summary.accepted);
    println!("Pending: {}", summary.pending);
    println!("Rejected: {}", summary.rejected);
    println!("No pick: {}", summary.no_pick);
    if summary.failed > 0 {
        println!("⚠️  Failed to process {} files", summary.failed);
    }

    let rejected: Vec<String> = report
        .with_label(PickLabel::Rejected)
        .map(|entry| display_name(&entry.path))
        .collect();
    if !rejected.is_empty() {
        println!("\n🗑️  Rejected: {}", rejected.join(", "));
    }

    if let Some(best) = report.best_pick() {
        println!(
            "\n⭐ Best pick: {} (quality: {:.1})",
            display_name(&best.path),
            best.final_quality()
        );
    }
}

/// One `path<TAB>metric=value` line per metric per assessed image
fn write_trace(report: &BatchReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create trace file {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);

    for entry in &report.entries {
        if let Some(quality) = &entry.report {
            for line in quality.trace_lines() {
                writeln!(writer, "{}\t{}", entry.path.display(), line)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
