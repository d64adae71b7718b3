//! Extract command - run the pipeline over a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use fidex_core::{ExtractionResult, Pipeline};

use super::load_config;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF, DOCX, text or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Bypass the result cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Full result as JSON
    Json,
    /// Budget candidates as CSV
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }

    pub fn render(self, result: &ExtractionResult) -> anyhow::Result<String> {
        match self {
            Self::Json => Ok(serde_json::to_string_pretty(result)?),
            Self::Csv => format_csv(result),
            Self::Text => Ok(format_text(result)),
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let config = load_config(config_path)?;
    let bytes = fs::read(&args.input)?;
    let filename = args
        .input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Extracting {}", filename));

    let use_cache = !args.no_cache;
    let result = tokio::task::spawn_blocking(move || {
        Pipeline::new(config).extract(&bytes, &filename, use_cache)
    })
    .await?;

    pb.finish_and_clear();
    debug!("Extraction finished in {:?}", result.processing_time());

    let output = args.format.render(&result)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Wrote {} to {}",
            style("✓").green(),
            result.filename,
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(error) = &result.metadata.error {
        eprintln!("{} {}", style("⚠").yellow(), error);
    }
    for warning in &result.metadata.warnings {
        eprintln!("  - {}", warning);
    }

    Ok(())
}

pub fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "amount",
        "currency",
        "formatted",
        "confidence",
        "is_budget_context",
        "source",
        "context",
    ])?;

    for budget in &result.budgets {
        wtr.write_record([
            &budget.amount.to_string(),
            budget.currency.as_str(),
            &budget.formatted,
            &format!("{:.2}", budget.confidence),
            &budget.is_budget_context.to_string(),
            &budget.source.to_string(),
            &budget.context,
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

pub fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", result.filename));
    output.push_str(&format!(
        "Pages: {}  Size: {} bytes  Time: {:.3}s\n",
        result.metadata.page_count, result.metadata.file_size, result.metadata.processing_time
    ));
    let methods: Vec<&str> = result.methods_used().iter().map(|m| m.as_str()).collect();
    output.push_str(&format!("Methods: {}\n", methods.join(", ")));
    output.push('\n');

    if result.budgets.is_empty() {
        output.push_str("No budgets found.\n");
    } else {
        output.push_str("Budgets:\n");
        for budget in &result.budgets {
            let marker = if budget.is_budget_context { "*" } else { " " };
            output.push_str(&format!(
                " {} {:>20}  {:.2}  {}\n",
                marker, budget.formatted, budget.confidence, budget.source
            ));
        }
    }

    let summary = &result.structured_data;
    if !summary.currency_breakdown.is_empty() {
        output.push_str("\nBy currency:\n");
        for (currency, breakdown) in &summary.currency_breakdown {
            output.push_str(&format!(
                "  {}: {} found, total {}, range {} - {}\n",
                currency,
                breakdown.count,
                breakdown.total_amount,
                breakdown.min_amount,
                breakdown.max_amount
            ));
        }
    }

    output.push_str(&format!("\nTables: {}\n", result.tables.len()));
    for table in &result.tables {
        output.push_str(&format!(
            "  {} ({}x{}, {})\n",
            table.table_id,
            table.row_count(),
            table.col_count(),
            table.source
        ));
    }

    output
}
