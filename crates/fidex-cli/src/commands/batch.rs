//! Batch command - extract data from many documents concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use fidex_core::{ExtractionResult, Pipeline};

use super::extract::OutputFormat;
use super::load_config;

const SUPPORTED_EXTENSIONS: [&str; 9] = ["pdf", "docx", "txt", "png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Bypass the result cache
    #[arg(long)]
    no_cache: bool,
}

/// Outcome for a single file.
struct FileOutcome {
    path: PathBuf,
    result: Option<ExtractionResult>,
    error: Option<String>,
    processing_time_ms: u64,
}

impl FileOutcome {
    fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!("{} Found {} files to process", style("ℹ").blue(), files.len());

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let pipeline = Arc::new(Pipeline::new(config));
    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));
    let use_cache = !args.no_cache;

    let mut tasks = JoinSet::new();
    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let worker_path = path.clone();
            let file_start = Instant::now();
            let joined = tokio::task::spawn_blocking(move || process_file(&pipeline, &worker_path, use_cache)).await;
            let processing_time_ms = file_start.elapsed().as_millis() as u64;

            let (result, error) = match joined {
                Ok(Ok(result)) => {
                    let error = result.metadata.error.clone();
                    (Some(result), error)
                }
                Ok(Err(e)) => (None, Some(e.to_string())),
                Err(e) => (None, Some(format!("worker failed: {}", e))),
            };

            FileOutcome {
                path,
                result,
                error,
                processing_time_ms,
            }
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined?;
        if let Some(error) = &outcome.error {
            warn!("Failed to process {}: {}", outcome.path.display(), error);
        }
        overall_pb.inc(1);
        outcomes.push(outcome);
    }
    outcomes.sort_by(|a, b| a.path.cmp(&b.path));

    overall_pb.finish_with_message("Complete");

    if let Some(output_dir) = &args.output_dir {
        for outcome in &outcomes {
            if let Some(result) = &outcome.result {
                let output_path = output_dir.join(output_name(&outcome.path, args.format));

                fs::write(&output_path, args.format.render(result)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &outcomes)?;
        println!("{} Summary written to {}", style("✓").green(), summary_path.display());
    }

    let failed: Vec<_> = outcomes.iter().filter(|o| !o.succeeded()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Keeps the input's extension so `a.pdf` and `a.docx` write `a.pdf.json` and `a.docx.json`.
fn output_name(path: &Path, format: OutputFormat) -> String {
    let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("document");
    format!("{}.{}", filename, format.extension())
}

fn process_file(pipeline: &Pipeline, path: &Path, use_cache: bool) -> anyhow::Result<ExtractionResult> {
    let bytes = fs::read(path)?;
    let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("document");
    Ok(pipeline.extract(&bytes, filename, use_cache))
}

fn write_summary(path: &Path, outcomes: &[FileOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "pages",
        "methods",
        "tables",
        "budgets",
        "largest_amount",
        "currencies",
        "processing_time_ms",
        "error",
    ])?;

    for outcome in outcomes {
        let filename = outcome.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let status = if outcome.succeeded() { "success" } else { "error" };
        let error = outcome.error.as_deref().unwrap_or("");
        let time = outcome.processing_time_ms.to_string();

        match &outcome.result {
            Some(result) => {
                let methods: Vec<&str> = result.methods_used().iter().map(|m| m.as_str()).collect();
                let currencies: Vec<&str> = result
                    .structured_data
                    .currency_breakdown
                    .keys()
                    .map(|c| c.as_str())
                    .collect();
                wtr.write_record([
                    filename,
                    status,
                    &result.metadata.page_count.to_string(),
                    &methods.join(";"),
                    &result.tables.len().to_string(),
                    &result.budgets.len().to_string(),
                    &result
                        .structured_data
                        .largest_amount
                        .map(|a| a.to_string())
                        .unwrap_or_default(),
                    &currencies.join(";"),
                    &time,
                    error,
                ])?;
            }
            None => {
                wtr.write_record([filename, status, "", "", "", "", "", "", &time, error])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("offer.PDF")));
        assert!(is_supported(Path::new("scan.jpeg")));
        assert!(is_supported(Path::new("smeta.docx")));
        assert!(!is_supported(Path::new("archive.zip")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_output_names_keep_extension() {
        let pdf = output_name(Path::new("in/a.pdf"), OutputFormat::Json);
        let docx = output_name(Path::new("in/a.docx"), OutputFormat::Json);

        assert_eq!(pdf, "a.pdf.json");
        assert_eq!(docx, "a.docx.json");
        assert_eq!(output_name(Path::new("smeta.txt"), OutputFormat::Csv), "smeta.txt.csv");
    }
}
