//! CLI entry point for the lead dataset pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use lead_processing::config::parse_iso_date;
use lead_processing::io::{read_csv, read_optional_csv, write_csv};
use lead_processing::{
    ArtifactBundle, FsArtifactStore, InferencePreparer, LeadSchema, NumericImputation, Pipeline,
    PipelineConfig, RunSummary, UnmappedSourcePolicy,
};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible numeric imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNumericImputation {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    Median,
}

impl From<CliNumericImputation> for NumericImputation {
    fn from(cli: CliNumericImputation) -> Self {
        match cli {
            CliNumericImputation::Mean => NumericImputation::Mean,
            CliNumericImputation::Median => NumericImputation::Median,
        }
    }
}

/// CLI-compatible policy for sources outside the grouping map
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliUnmappedSource {
    /// Leave the derived group missing
    Missing,
    /// Put the row in the "Others" group
    Others,
}

impl From<CliUnmappedSource> for UnmappedSourcePolicy {
    fn from(cli: CliUnmappedSource) -> Self {
        match cli {
            CliUnmappedSource::Missing => UnmappedSourcePolicy::Missing,
            CliUnmappedSource::Others => UnmappedSourcePolicy::Others,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Lead dataset preparation pipeline",
    long_about = "Prepares a lead-generation export for model training and persists \
                  every fitted value as an artifact.\n\n\
                  EXAMPLES:\n  \
                  # Clean, impute and scale January 2024\n  \
                  lead-processing make-dataset -i raw_data.csv -a artifacts/\n\n  \
                  # Build the model-ready feature table\n  \
                  lead-processing build-features -i artifacts/train_data_gold.csv \
                  -o features.csv -a artifacts/\n\n  \
                  # Prepare unseen records with the stored artifacts\n  \
                  lead-processing prepare-inference -i X_test.csv -o X_ready.csv -a artifacts/"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the dataset stage: filter, clean, impute, scale
    MakeDataset {
        /// Raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Earliest date kept (YYYY-MM-DD)
        #[arg(long, default_value = "2024-01-01")]
        min_date: String,

        /// Latest date kept (YYYY-MM-DD)
        #[arg(long, default_value = "2024-01-31")]
        max_date: String,

        /// Strategy for imputing missing continuous values
        #[arg(long, value_enum, default_value = "mean")]
        numeric_imputation: CliNumericImputation,

        /// What to do with sources outside the grouping map
        #[arg(long, value_enum, default_value = "missing")]
        unmapped_source: CliUnmappedSource,

        /// Print the run summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the feature stage on a gold dataset
    BuildFeatures {
        /// Gold dataset CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Feature table CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,
    },

    /// Prepare unseen records with the artifacts of a finished run
    PrepareInference {
        /// Raw records CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Prepared feature CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Artifact directory of the training run
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Optional label CSV, checked for row count when present
        #[arg(long)]
        labels: Option<PathBuf>,

        /// What to do with sources outside the grouping map
        #[arg(long, value_enum, default_value = "missing")]
        unmapped_source: CliUnmappedSource,
    },
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet);

    // Load environment variables from .env file
    dotenv().ok();

    let result = match args.command {
        Command::MakeDataset {
            input,
            artifacts,
            min_date,
            max_date,
            numeric_imputation,
            unmapped_source,
            json,
        } => {
            let config = PipelineConfig::builder()
                .min_date(parse_iso_date(&min_date)?)
                .max_date(parse_iso_date(&max_date)?)
                .numeric_imputation(numeric_imputation.into())
                .unmapped_source_policy(unmapped_source.into())
                .artifact_dir(artifacts)
                .build()?;
            run_make_dataset(config, &input, json)
        }
        Command::BuildFeatures {
            input,
            output,
            artifacts,
        } => run_build_features(&input, &output, artifacts),
        Command::PrepareInference {
            input,
            output,
            artifacts,
            labels,
            unmapped_source,
        } => run_prepare_inference(&input, &output, &artifacts, labels, unmapped_source.into()),
    };

    if let Err(ref e) = result {
        error!("{:#}", e);
    }
    result
}

fn run_make_dataset(config: PipelineConfig, input: &Path, json: bool) -> Result<()> {
    let raw = read_csv(input).with_context(|| format!("loading {}", input.display()))?;

    info!("{}", "=".repeat(80));
    info!("Starting dataset stage...");
    info!("{}", "=".repeat(80));

    let artifact_dir = config.artifact_dir.clone();
    let pipeline = Pipeline::builder()
        .config(config)
        .on_progress(|update| {
            info!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()?;

    let outcome = pipeline
        .make_dataset(raw)
        .map_err(|e| anyhow!("Dataset stage failed: {}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    } else {
        print_summary(&outcome.summary, &artifact_dir);
    }
    Ok(())
}

fn run_build_features(input: &Path, output: &Path, artifacts: PathBuf) -> Result<()> {
    let gold = read_csv(input).with_context(|| format!("loading {}", input.display()))?;

    let config = PipelineConfig::builder().artifact_dir(artifacts).build()?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let mut features = pipeline
        .build_features(gold)
        .map_err(|e| anyhow!("Feature stage failed: {}", e))?;
    write_csv(&mut features.frame, output)?;

    println!(
        "Wrote {} rows x {} features to {}",
        features.frame.height(),
        features.columns.len(),
        output.display()
    );
    Ok(())
}

fn run_prepare_inference(
    input: &Path,
    output: &Path,
    artifacts: &Path,
    labels: Option<PathBuf>,
    policy: UnmappedSourcePolicy,
) -> Result<()> {
    let raw = read_csv(input).with_context(|| format!("loading {}", input.display()))?;
    let store = FsArtifactStore::new(artifacts)?;
    let bundle = ArtifactBundle::load(&store)?;

    let batch = InferencePreparer::new(bundle, LeadSchema::default(), policy).prepare(raw)?;

    if let Some(path) = labels {
        match read_optional_csv(&path)? {
            Some(y) if y.height() != batch.features.height() => {
                return Err(anyhow!(
                    "label file {} has {} rows, features have {}",
                    path.display(),
                    y.height(),
                    batch.features.height()
                ));
            }
            Some(_) => info!("Labels found at {}", path.display()),
            None => info!("No labels at {}; preparing features only", path.display()),
        }
    }

    let mut frame = batch.features.clone();
    frame.insert_column(0, batch.lead_ids.clone().into_column())?;
    write_csv(&mut frame, output)?;

    println!(
        "Prepared {} rows x {} features into {}",
        batch.features.height(),
        batch.features.width(),
        output.display()
    );
    Ok(())
}

/// Print the run summary to stdout.
///
/// Uses `println!` on purpose: the summary is the command's output, not a log.
fn print_summary(summary: &RunSummary, artifact_dir: &Path) {
    println!("\n{}", "=".repeat(80));
    println!("DATASET STAGE COMPLETE");
    println!("{}", "=".repeat(80));
    println!(
        "Rows: {} -> {} ({} removed)",
        summary.rows_before,
        summary.rows_after,
        summary.rows_removed()
    );
    println!(
        "Columns: {} -> {}",
        summary.columns_before, summary.columns_after
    );
    println!("Duration: {}ms", summary.duration_ms);

    println!("\nFiltering steps:");
    for step in &summary.steps {
        println!(
            "  - {}: {} -> {} rows",
            step.step, step.rows_before, step.rows_after
        );
    }

    println!("\nArtifacts written to {}:", artifact_dir.display());
    for artifact in &summary.artifacts_written {
        println!("  - {}", artifact.file_name());
    }

    if !summary.actions.is_empty() {
        println!("\nActions:");
        for action in &summary.actions {
            println!("  - {}", action);
        }
    }
    println!("{}", "=".repeat(80));
}
