//! Aggregation of classifier results into experiment tables.
//!
//! The experiment driver writes one classification report per feature
//! subset, classifier and test subset, named
//! `{subset_id}{classifier}_test{i}_classification_report.txt`. Each file is
//! the JSON form of a per-class precision / recall table:
//!
//! ```text
//! {"HTTPS": {"precision": 0.91, "recall": 0.88, "f1-score": 0.89, "support": 120},
//!  ...,
//!  "accuracy": 0.87,
//!  "macro avg": {...},
//!  "weighted avg": {...}}
//! ```
//!
//! From those we build, per classifier:
//! - an [`ExperimentTable`] of weighted precision, weighted recall and
//!   accuracy for every test subset,
//! - confidence intervals of each metric across test subsets,
//! - a five-number summary of every class's precision across test subsets.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::{Data, Max, Min, OrderStatistics, Statistics};
use tracing::{debug, info, warn};

use crate::error::ReportError;
use crate::subsets::{self, FeatureSubset};

/// Two-sided 99.9% normal quantile.
pub const NORMAL_Z: f64 = 3.291;
/// Quantile used for the Student-t interval.
pub const T_QUANTILE: f64 = 0.999;

const AVERAGE_KEYS: [&str; 3] = ["macro avg", "micro avg", "weighted avg"];
const ACCURACY_KEY: &str = "accuracy";

/// Classifiers the experiment driver evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classifier {
    Knn,
    Dt,
    Rf,
}

impl Classifier {
    pub const ALL: [Classifier; 3] = [Classifier::Knn, Classifier::Dt, Classifier::Rf];

    /// Tag used in result and report file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Knn => "knn",
            Self::Dt => "dt",
            Self::Rf => "rf",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Knn => "K-Nearest Neighbors",
            Self::Dt => "Decision Tree",
            Self::Rf => "Random Forest",
        }
    }

    /// Path of one classification report inside `results_dir`.
    pub fn report_path(&self, results_dir: &Path, subset: &FeatureSubset, test: usize) -> PathBuf {
        results_dir.join(format!(
            "{}{}_test{}_classification_report.txt",
            subset.id(),
            self.tag(),
            test
        ))
    }
}

impl std::fmt::Display for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Confidence interval construction across test subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalMethod {
    /// `t(0.999, n-1) * s / sqrt(n)` with the sample deviation
    #[default]
    StudentT,
    /// `3.291 * sigma / sqrt(n)` with the population deviation
    Normal,
}

impl std::str::FromStr for IntervalMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student-t" | "t" => Ok(Self::StudentT),
            "normal" | "z" => Ok(Self::Normal),
            _ => Err(format!("Unknown interval method: {}", s)),
        }
    }
}

impl std::fmt::Display for IntervalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StudentT => write!(f, "student-t"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// Report stage settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub method: IntervalMethod,
    /// Decimal places kept (by truncation) in experiment tables
    pub decimals: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            method: IntervalMethod::StudentT,
            decimals: 4,
        }
    }
}

/// Scores of one class (or one average) in a classification report.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score", default)]
    pub f1_score: f64,
    #[serde(default)]
    pub support: f64,
}

/// Parsed classification report for one test subset.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: BTreeMap<String, ClassScores>,
    pub accuracy: f64,
    pub weighted_avg: ClassScores,
    pub macro_avg: Option<ClassScores>,
}

impl ClassificationReport {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|reason| ReportError::Malformed {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses the JSON report text.
    ///
    /// Reports from older classifier libraries carry `micro avg` instead of
    /// `accuracy`; its recall is used as the accuracy then.
    pub fn parse(text: &str) -> Result<Self, String> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| e.to_string())?;

        let mut classes = BTreeMap::new();
        let mut averages = BTreeMap::new();
        let mut accuracy = None;
        for (key, value) in raw {
            if key == ACCURACY_KEY {
                accuracy = Some(
                    value
                        .as_f64()
                        .ok_or_else(|| format!("'{}' is not a number", ACCURACY_KEY))?,
                );
                continue;
            }
            let scores: ClassScores = serde_json::from_value(value)
                .map_err(|e| format!("entry '{}': {}", key, e))?;
            if AVERAGE_KEYS.contains(&key.as_str()) {
                averages.insert(key, scores);
            } else {
                classes.insert(key, scores);
            }
        }

        let weighted_avg = averages
            .get("weighted avg")
            .copied()
            .ok_or_else(|| "missing 'weighted avg'".to_string())?;
        let accuracy = accuracy
            .or_else(|| averages.get("micro avg").map(|m| m.recall))
            .ok_or_else(|| "missing 'accuracy'".to_string())?;

        Ok(Self {
            classes,
            accuracy,
            weighted_avg,
            macro_avg: averages.get("macro avg").copied(),
        })
    }
}

/// Summary metrics tracked per test subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Accuracy,
    Precision,
    Recall,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Accuracy, Metric::Precision, Metric::Recall];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
        }
    }
}

/// Truncated metrics of one test subset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

impl TestMetrics {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
        }
    }
}

/// All test results of one feature subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentRow {
    pub subset: FeatureSubset,
    pub tests: Vec<TestMetrics>,
    /// Untruncated per-class precision, one value per test containing the class
    pub class_precision: BTreeMap<String, Vec<f64>>,
}

impl ExperimentRow {
    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.tests.iter().map(|t| t.get(metric)).collect()
    }
}

/// Per-classifier results across the subset catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentTable {
    pub classifier: Classifier,
    pub num_tests: usize,
    pub rows: Vec<ExperimentRow>,
}

impl ExperimentTable {
    /// Reads every report of `classifier` from `results_dir`.
    ///
    /// Subsets without any report are skipped. A subset with only some of its
    /// `num_tests` reports is an error naming the first missing file.
    pub fn collect(
        results_dir: &Path,
        classifier: Classifier,
        num_tests: usize,
        decimals: u32,
    ) -> Result<Self, ReportError> {
        if num_tests == 0 {
            return Err(ReportError::InsufficientTests {
                required: 1,
                actual: 0,
            });
        }

        let mut rows = Vec::new();
        for subset in subsets::all() {
            let paths: Vec<PathBuf> = (1..=num_tests)
                .map(|test| classifier.report_path(results_dir, &subset, test))
                .collect();
            let present = paths.iter().filter(|p| p.is_file()).count();
            if present == 0 {
                debug!("No {} reports for subset {}; skipping", classifier, subset.id());
                continue;
            }
            if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
                return Err(ReportError::MissingReport(missing.clone()));
            }

            let mut tests = Vec::with_capacity(num_tests);
            let mut class_precision: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for path in &paths {
                let report = ClassificationReport::load(path)?;
                tests.push(TestMetrics {
                    accuracy: truncate(report.accuracy, decimals),
                    precision: truncate(report.weighted_avg.precision, decimals),
                    recall: truncate(report.weighted_avg.recall, decimals),
                });
                for (class, scores) in &report.classes {
                    class_precision
                        .entry(class.clone())
                        .or_default()
                        .push(scores.precision);
                }
            }
            rows.push(ExperimentRow {
                subset,
                tests,
                class_precision,
            });
        }

        if rows.is_empty() {
            warn!("No {} classification reports found in {}", classifier, results_dir.display());
        } else {
            info!("Collected {} {} feature subsets", rows.len(), classifier);
        }

        Ok(Self {
            classifier,
            num_tests,
            rows,
        })
    }

    /// Writes `features`, then `test{i} accuracy/precision/recall` columns.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        let mut header = vec!["features".to_string()];
        for test in 1..=self.num_tests {
            for metric in Metric::ALL {
                header.push(format!("test{} {}", test, metric.name()));
            }
        }
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.subset.label()];
            for test in &row.tests {
                for metric in Metric::ALL {
                    record.push(test.get(metric).to_string());
                }
            }
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn intervals(&self, method: IntervalMethod) -> Result<Vec<IntervalRow>, ReportError> {
        self.rows
            .iter()
            .map(|row| {
                let mut intervals = BTreeMap::new();
                for metric in Metric::ALL {
                    intervals.insert(metric, confidence_interval(&row.values(metric), method)?);
                }
                Ok(IntervalRow {
                    features: row.subset.label(),
                    intervals,
                })
            })
            .collect()
    }

    pub fn class_precision(&self) -> Vec<ClassPrecisionSummary> {
        let mut summaries = Vec::new();
        for row in &self.rows {
            for (class, values) in &row.class_precision {
                if let Some(summary) = FiveNumberSummary::of(values) {
                    summaries.push(ClassPrecisionSummary {
                        features: row.subset.label(),
                        class: class.clone(),
                        tests: values.len(),
                        summary,
                    });
                }
            }
        }
        summaries
    }
}

/// Mean and half-width of a confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub error: f64,
}

impl ConfidenceInterval {
    pub fn lower(&self) -> f64 {
        self.mean - self.error
    }

    pub fn upper(&self) -> f64 {
        self.mean + self.error
    }
}

/// Intervals of every metric for one feature subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalRow {
    pub features: String,
    pub intervals: BTreeMap<Metric, ConfidenceInterval>,
}

/// Computes the interval of `values` across test subsets.
pub fn confidence_interval(
    values: &[f64],
    method: IntervalMethod,
) -> Result<ConfidenceInterval, ReportError> {
    let n = values.len();
    let required = match method {
        IntervalMethod::StudentT => 2,
        IntervalMethod::Normal => 1,
    };
    if n < required {
        return Err(ReportError::InsufficientTests {
            required,
            actual: n,
        });
    }

    let mean = values.iter().mean();
    let root_n = (n as f64).sqrt();
    let error = match method {
        IntervalMethod::StudentT => {
            let dist = StudentsT::new(0.0, 1.0, (n - 1) as f64)
                .map_err(|e| ReportError::Distribution(e.to_string()))?;
            dist.inverse_cdf(T_QUANTILE) * values.iter().std_dev() / root_n
        }
        IntervalMethod::Normal => NORMAL_Z * values.iter().population_std_dev() / root_n,
    };

    Ok(ConfidenceInterval { mean, error })
}

pub fn write_intervals<W: Write>(rows: &[IntervalRow], writer: W) -> Result<(), ReportError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let mut header = vec!["features".to_string()];
    for metric in Metric::ALL {
        header.push(format!("{} mean", metric.name()));
        header.push(format!("{} error", metric.name()));
    }
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.features.clone()];
        for metric in Metric::ALL {
            match row.intervals.get(&metric) {
                Some(ci) => {
                    record.push(ci.mean.to_string());
                    record.push(ci.error.to_string());
                }
                None => record.extend([String::new(), String::new()]),
            }
        }
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Min, quartiles and max of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumberSummary {
    /// `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut data = Data::new(values.to_vec());
        Some(Self {
            min: Min::min(&data),
            q1: data.lower_quartile(),
            median: data.median(),
            q3: data.upper_quartile(),
            max: Max::max(&data),
        })
    }
}

/// Precision distribution of one class under one feature subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassPrecisionSummary {
    pub features: String,
    pub class: String,
    pub tests: usize,
    #[serde(flatten)]
    pub summary: FiveNumberSummary,
}

pub fn write_class_precision<W: Write>(
    rows: &[ClassPrecisionSummary],
    writer: W,
) -> Result<(), ReportError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(["features", "class", "tests", "min", "q1", "median", "q3", "max"])?;
    for row in rows {
        let s = &row.summary;
        wtr.write_record([
            row.features.clone(),
            row.class.clone(),
            row.tests.to_string(),
            s.min.to_string(),
            s.q1.to_string(),
            s.median.to_string(),
            s.q3.to_string(),
            s.max.to_string(),
        ])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Renders a table with per-test precision / recall and their intervals as a
/// LaTeX `tabular`, four decimals per cell.
pub fn render_latex(table: &ExperimentTable, intervals: &[IntervalRow]) -> String {
    let n = table.num_tests;
    let tag = table.classifier.tag().to_uppercase();
    let mut out = String::new();
    out.push_str("\\begin{table}[htpb]\n\\centering\n\\resizebox{\\textwidth}{!}{%\n");
    out.push_str(&format!("\\begin{{tabular}}{{l{}cc}}\n", "c".repeat(n * 2)));
    out.push_str(&format!("\\cline{{2-{}}}\n", n * 2 + 3));

    out.push_str("\\multicolumn{1}{c}{\\textbf{}}");
    for test in 1..=n {
        out.push_str(&format!(" & \\multicolumn{{2}}{{c}}{{\\textbf{{Test {}}}}}", test));
    }
    out.push_str(" & \\multicolumn{2}{c}{\\textbf{Confidence Interval}} \\\\ \\hline\n");
    out.push_str("\\textbf{Features}");
    for _ in 0..=n {
        out.push_str(" & \\textbf{Precision} & \\textbf{Recall}");
    }
    out.push_str(" \\\\ \\hline \\hline\n");

    for (row, ci) in table.rows.iter().zip(intervals) {
        let mut line = row.subset.label();
        for test in &row.tests {
            line.push_str(&format!(" & {:.4} & {:.4}", test.precision, test.recall));
        }
        for metric in [Metric::Precision, Metric::Recall] {
            if let Some(interval) = ci.intervals.get(&metric) {
                line.push_str(&format!(" & {:.4} $\\pm$ {:.4}", interval.mean, interval.error));
            }
        }
        line.push_str(" \\\\ \\hline\n");
        out.push_str(&line);
    }

    out.push_str("\\end{tabular}%\n}\n");
    out.push_str(&format!("\\caption{{{} experimental results.}}\n", tag));
    out.push_str(&format!("\\label{{tab:{}_results}}\n\\end{{table}}\n", tag));
    out
}

/// Files written for one classifier.
#[derive(Debug, Clone, Serialize)]
pub struct ReportFiles {
    pub classifier: Classifier,
    pub subsets: usize,
    pub experiments: PathBuf,
    pub intervals: PathBuf,
    pub class_precision: PathBuf,
    pub latex: PathBuf,
}

/// Writes every report for `table` into `report_dir`, returning the files and
/// the interval rows they were built from.
pub fn write_reports(
    table: &ExperimentTable,
    config: &ReportConfig,
    report_dir: &Path,
) -> anyhow::Result<(ReportFiles, Vec<IntervalRow>)> {
    std::fs::create_dir_all(report_dir)
        .with_context(|| format!("Failed to create {}", report_dir.display()))?;
    let tag = table.classifier.tag();

    let experiments = report_dir.join(format!("precision_recall_{}_experiments.csv", tag));
    table
        .write_csv(create(&experiments)?)
        .with_context(|| format!("Failed to write {}", experiments.display()))?;

    let rows = table.intervals(config.method)?;
    let intervals = report_dir.join(format!("ci_{}.csv", tag));
    write_intervals(&rows, create(&intervals)?)
        .with_context(|| format!("Failed to write {}", intervals.display()))?;

    let class_precision = report_dir.join(format!("class_precision_{}.csv", tag));
    write_class_precision(&table.class_precision(), create(&class_precision)?)
        .with_context(|| format!("Failed to write {}", class_precision.display()))?;

    let latex = report_dir.join(format!("{}_latex.txt", tag));
    std::fs::write(&latex, render_latex(table, &rows))
        .with_context(|| format!("Failed to write {}", latex.display()))?;

    info!("Wrote {} reports to {}", table.classifier.name(), report_dir.display());

    let files = ReportFiles {
        classifier: table.classifier,
        subsets: table.rows.len(),
        experiments,
        intervals,
        class_precision,
        latex,
    };
    Ok((files, rows))
}

fn create(path: &Path) -> anyhow::Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Drops digits past `decimals` places.
pub fn truncate(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).trunc() / factor
}
