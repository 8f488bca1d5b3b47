//! netflow-classify: label, augment and partition NetFlow exports for
//! traffic classification experiments, then aggregate classifier results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use netflow_classify::config::{Config, DEFAULT_CONFIG_FILE};
use netflow_classify::dataset::Dataset;
use netflow_classify::export::{
    export, AugmentSummary, OutputFormat, PartitionSummary, ReportSummary, SubsetCatalog,
};
use netflow_classify::features::{Augmentation, SourceAddressFeatures};
use netflow_classify::labels::{label_dataset, LabelMap};
use netflow_classify::partition::Partitioner;
use netflow_classify::report::{write_reports, Classifier, ExperimentTable, IntervalMethod};
use netflow_classify::subsets::{self, FeatureSubset};

/// Flow labeling, feature engineering and train/test partitioning.
#[derive(Parser, Debug)]
#[command(name = "netflow-classify")]
#[command(version = "0.1.0")]
#[command(about = "Prepare NetFlow datasets for traffic classification experiments")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (default: ./netflow-classify.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (writes to stderr).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: text, json, jsonl.
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drop zero-duration flows and add a class column from the app tag.
    Label {
        /// Flow file with an `app` column.
        input: PathBuf,

        /// Output file (default: <input stem>_labeled.csv).
        output: Option<PathBuf>,

        /// Overwrite the input file instead of writing a new one.
        #[arg(long, conflicts_with = "output")]
        in_place: bool,

        /// Tag table to use instead of the configured one.
        #[arg(short, long)]
        labels: Option<PathBuf>,
    },

    /// Add per-source-address distinct-count features.
    Augment {
        /// Flow file.
        input: PathBuf,

        /// Output file (default: <input stem>_engineered.csv).
        output: Option<PathBuf>,

        /// Overwrite the input file instead of writing a new one.
        #[arg(long, conflicts_with = "output")]
        in_place: bool,
    },

    /// Split a labeled dataset into a train set and N test subsets, standardized.
    Partition {
        /// Number of test subsets.
        num_tests: usize,

        /// Labeled (and augmented) flow file.
        input: PathBuf,

        /// Directory for train_scale.csv and test{i}_scale.csv.
        output_dir: PathBuf,

        /// Directory for scaler.bin, train_test_split.csv and manifest.json.
        metadata_dir: PathBuf,

        /// Shuffle seed.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Share of each class assigned to train.
        #[arg(short, long)]
        train_fraction: Option<f64>,

        /// Comma-separated feature columns, or a subset catalog number.
        #[arg(long)]
        features: Option<String>,
    },

    /// List the feature subset catalog.
    Subsets,

    /// Aggregate classification reports into experiment tables and intervals.
    Report {
        /// Number of test subsets per experiment.
        num_tests: usize,

        /// Directory holding the classification report files.
        results_dir: PathBuf,

        /// Directory for the generated report files.
        report_dir: PathBuf,

        /// Interval method: student-t, normal.
        #[arg(short, long)]
        method: Option<IntervalMethod>,
    },

    /// Print a default configuration file.
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG_FILE)),
    };
    config.validate().context("Invalid configuration")?;
    let format = cli.format.unwrap_or(config.output.format);

    match cli.command {
        Commands::Label {
            input,
            output,
            in_place,
            labels,
        } => {
            let map = match labels {
                Some(path) => LabelMap::load(&path)?,
                None => config.labels.resolve()?,
            };
            let mut dataset = load_dataset(&input)?;
            let summary = label_dataset(&mut dataset, &map)
                .with_context(|| format!("Failed to label {}", input.display()))?;
            let output = output_path(&input, output, in_place, "labeled");
            save_dataset(&dataset, &output)?;
            println!("{}", export(&summary, format));
        }

        Commands::Augment {
            input,
            output,
            in_place,
        } => {
            let mut dataset = load_dataset(&input)?;
            let augmentation = SourceAddressFeatures;
            augmentation
                .augment(&mut dataset)
                .with_context(|| format!("Failed to augment {}", input.display()))?;
            let output = output_path(&input, output, in_place, "engineered");
            save_dataset(&dataset, &output)?;
            let columns = augmentation.columns().iter().map(|f| f.name().to_string()).collect();
            println!("{}", export(&AugmentSummary::new(&dataset, output, columns), format));
        }

        Commands::Partition {
            num_tests,
            input,
            output_dir,
            metadata_dir,
            seed,
            train_fraction,
            features,
        } => {
            let mut partition_config = config.partition.clone();
            partition_config.num_tests = num_tests;
            if let Some(seed) = seed {
                partition_config.seed = seed;
            }
            if let Some(fraction) = train_fraction {
                partition_config.train_fraction = fraction;
            }
            if let Some(features) = features {
                partition_config.features = parse_features(&features)?;
            }

            let partitioner = Partitioner::new(partition_config.clone())?;
            let dataset = load_dataset(&input)?;
            let set = partitioner
                .split(&dataset)
                .with_context(|| format!("Failed to partition {}", input.display()))?;
            let manifest = set.manifest(dataset.name(), &partition_config);
            let artifacts = set.save(&output_dir, &metadata_dir, &manifest)?;

            let summary = PartitionSummary {
                manifest,
                breakdown: set.breakdown(),
                artifacts,
            };
            println!("{}", export(&summary, format));
        }

        Commands::Subsets => {
            let all = subsets::all();
            println!("{}", export(&SubsetCatalog::from(all.as_slice()), format));
        }

        Commands::Report {
            num_tests,
            results_dir,
            report_dir,
            method,
        } => {
            let mut report_config = config.report.clone();
            if let Some(method) = method {
                report_config.method = method;
            }

            let mut files = Vec::new();
            let mut intervals = BTreeMap::new();
            for classifier in Classifier::ALL {
                let table = ExperimentTable::collect(
                    &results_dir,
                    classifier,
                    num_tests,
                    report_config.decimals,
                )
                .with_context(|| format!("Failed to collect {} results", classifier))?;
                if table.rows.is_empty() {
                    continue;
                }
                let (written, rows) = write_reports(&table, &report_config, &report_dir)?;
                files.push(written);
                intervals.insert(classifier.tag().to_string(), rows);
            }
            if files.is_empty() {
                anyhow::bail!(
                    "No classification reports found in {}",
                    results_dir.display()
                );
            }

            let summary = ReportSummary {
                num_tests,
                method: report_config.method,
                files,
                intervals,
            };
            println!("{}", export(&summary, format));
        }

        Commands::InitConfig => {
            println!("{}", Config::generate_default());
        }
    }

    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    info!("Reading {}", path.display());
    Dataset::load(path).with_context(|| format!("Failed to load dataset {}", path.display()))
}

fn save_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    dataset
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} flows to {}", dataset.len(), path.display());
    Ok(())
}

/// Where a stage writes its dataset: the explicit path, the input itself
/// with `--in-place`, or a sibling file named after the stage.
fn output_path(input: &Path, output: Option<PathBuf>, in_place: bool, suffix: &str) -> PathBuf {
    match output {
        Some(path) => path,
        None if in_place => input.to_path_buf(),
        None => derived_path(input, suffix),
    }
}

/// `dir/flows.csv` with suffix `labeled` becomes `dir/flows_labeled.csv`.
fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flows".to_string());
    input.with_file_name(format!("{}_{}.csv", stem, suffix))
}

/// Accepts a catalog number (`0`..`7`) or a comma-separated column list.
fn parse_features(value: &str) -> Result<Vec<String>> {
    if let Ok(number) = value.trim().parse::<usize>() {
        return FeatureSubset::get(number)
            .map(|s| s.features)
            .with_context(|| format!("No feature subset number {}", number));
    }
    let features: Vec<String> = value
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if features.is_empty() {
        anyhow::bail!("Feature list is empty");
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_defaults_to_sibling_file() {
        let input = Path::new("data/flows.csv");
        assert_eq!(
            output_path(input, None, false, "labeled"),
            PathBuf::from("data/flows_labeled.csv")
        );
        assert_eq!(output_path(input, None, true, "labeled"), input.to_path_buf());
        assert_eq!(
            output_path(input, Some(PathBuf::from("out.csv")), false, "engineered"),
            PathBuf::from("out.csv")
        );
    }

    #[test]
    fn test_in_place_conflicts_with_output() {
        let parsed = Cli::try_parse_from(["netflow-classify", "label", "in.csv", "--in-place"]);
        assert!(parsed.is_ok());
        let parsed =
            Cli::try_parse_from(["netflow-classify", "augment", "in.csv", "out.csv", "--in-place"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_features() {
        assert_eq!(parse_features("0").unwrap(), vec!["duration", "dPkts", "dOctets"]);
        assert_eq!(parse_features(" duration , dPkts ").unwrap(), vec!["duration", "dPkts"]);
        assert!(parse_features("9").is_err());
        assert!(parse_features(",").is_err());
    }
}
