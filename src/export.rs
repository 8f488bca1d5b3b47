//! Export Module
//!
//! Renders stage summaries for stdout as text tables or JSON. Stage output
//! files are written by the stages themselves; this is only what the operator
//! sees.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::dataset::Dataset;
use crate::labels::LabelSummary;
use crate::partition::{ClassBreakdown, PartitionArtifacts, PartitionManifest};
use crate::report::{IntervalMethod, IntervalRow, Metric, ReportFiles};
use crate::subsets::FeatureSubset;

/// Output format for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonLines, // One JSON object per line (JSONL)
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "jsonl" | "jsonlines" => Ok(Self::JsonLines),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::JsonLines => write!(f, "jsonl"),
        }
    }
}

/// A stage summary that can be printed in every [`OutputFormat`].
pub trait Exportable: Serialize {
    fn to_text(&self) -> String;

    /// Records emitted in JSON Lines mode; the whole value by default.
    fn json_lines(&self) -> Vec<serde_json::Value> {
        vec![serde_json::to_value(self).unwrap_or_default()]
    }
}

/// Exports a summary in the specified format
pub fn export<T: Exportable>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => value.to_text(),
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputFormat::JsonLines => value
            .json_lines()
            .iter()
            .filter_map(|v| serde_json::to_string(v).ok())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

impl Exportable for LabelSummary {
    fn to_text(&self) -> String {
        let mut output = format!(
            "--- Label Summary ---\nRows Read: {}\nZero-Duration Dropped: {}\nLabeled: {}\nMissing Tag: {}\n",
            self.rows_read, self.zero_duration_dropped, self.labeled, self.missing_tag
        );
        output.push_str(&format!("\nClasses ({}):\n", self.classes.len()));
        output.push_str(&count_table(&self.classes));
        if !self.unmapped.is_empty() {
            output.push_str(&format!("\nUnmapped Tags ({}):\n", self.unmapped.len()));
            output.push_str(&count_table(&self.unmapped));
        }
        output
    }
}

/// Result of the augment stage.
#[derive(Debug, Clone, Serialize)]
pub struct AugmentSummary {
    pub output: PathBuf,
    pub flows: usize,
    pub sources: usize,
    pub columns: Vec<String>,
}

impl AugmentSummary {
    pub fn new(dataset: &Dataset, output: PathBuf, columns: Vec<String>) -> Self {
        let sources: HashSet<&str> = dataset.records().iter().map(|r| r.srcaddr.as_str()).collect();
        Self {
            output,
            flows: dataset.len(),
            sources: sources.len(),
            columns,
        }
    }
}

impl Exportable for AugmentSummary {
    fn to_text(&self) -> String {
        format!(
            "--- Augment Summary ---\nFlows: {}\nSource Addresses: {}\nColumns Added: {}\nOutput: {}\n",
            self.flows,
            self.sources,
            self.columns.join(", "),
            self.output.display()
        )
    }
}

/// Result of the partition stage.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionSummary {
    pub manifest: PartitionManifest,
    pub breakdown: ClassBreakdown,
    pub artifacts: PartitionArtifacts,
}

impl Exportable for PartitionSummary {
    fn to_text(&self) -> String {
        let m = &self.manifest;
        let mut output = format!(
            "--- Partition Summary ---\nSource: {}\nSeed: {}\nTrain Fraction: {}\nFeatures: {}\nTrain Rows: {}\nTest Rows: {}\nScaler: {} ({})\n",
            m.source,
            m.seed,
            m.train_fraction,
            m.features.join(", "),
            m.train_rows,
            m.test_rows
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" / "),
            self.artifacts.scaler.display(),
            &m.scaler_fingerprint[..m.scaler_fingerprint.len().min(12)],
        );
        output.push('\n');
        output.push_str(&breakdown_text(&self.breakdown));
        output
    }
}

/// Renders a class breakdown as an aligned table with a totals row.
pub fn breakdown_text(breakdown: &ClassBreakdown) -> String {
    let width = breakdown
        .rows
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("Class".len());
    let mut output = format!("{:<width$}", "Class", width = width);
    for name in &breakdown.partitions {
        output.push_str(&format!(" {:>8}", name));
    }
    output.push('\n');
    output.push_str(&"-".repeat(width + 9 * breakdown.partitions.len()));
    output.push('\n');

    let mut totals = vec![0usize; breakdown.partitions.len()];
    for (class, counts) in &breakdown.rows {
        output.push_str(&format!("{:<width$}", class, width = width));
        for (total, count) in totals.iter_mut().zip(counts) {
            *total += count;
            output.push_str(&format!(" {:>8}", count));
        }
        output.push('\n');
    }
    output.push_str(&format!("{:<width$}", "Total", width = width));
    for total in totals {
        output.push_str(&format!(" {:>8}", total));
    }
    output.push('\n');
    output
}

/// The feature subset catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetCatalog {
    pub subsets: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub number: usize,
    pub id: String,
    pub label: String,
    pub features: Vec<String>,
}

impl From<&[FeatureSubset]> for SubsetCatalog {
    fn from(subsets: &[FeatureSubset]) -> Self {
        Self {
            subsets: subsets
                .iter()
                .map(|s| CatalogEntry {
                    number: s.number,
                    id: s.id(),
                    label: s.label(),
                    features: s.features.clone(),
                })
                .collect(),
        }
    }
}

impl Exportable for SubsetCatalog {
    fn to_text(&self) -> String {
        let mut output = format!("{:>3}  {:<36} {}\n", "#", "Label", "Identifier");
        output.push_str(&"-".repeat(100));
        output.push('\n');
        for entry in &self.subsets {
            output.push_str(&format!("{:>3}  {:<36} {}\n", entry.number, entry.label, entry.id));
        }
        output
    }

    fn json_lines(&self) -> Vec<serde_json::Value> {
        self.subsets
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect()
    }
}

/// Result of the report stage.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub num_tests: usize,
    pub method: IntervalMethod,
    pub files: Vec<ReportFiles>,
    /// Interval rows keyed by classifier tag
    pub intervals: BTreeMap<String, Vec<IntervalRow>>,
}

impl Exportable for ReportSummary {
    fn to_text(&self) -> String {
        let mut output = format!(
            "--- Report Summary ---\nTest Subsets: {}\nInterval Method: {}\n",
            self.num_tests, self.method
        );
        for files in &self.files {
            output.push_str(&format!(
                "\n{} ({} feature subsets) -> {}\n",
                files.classifier.name(),
                files.subsets,
                files.experiments.display()
            ));
            let Some(rows) = self.intervals.get(files.classifier.tag()) else {
                continue;
            };
            output.push_str(&format!(
                "{:<44} {:>18} {:>18} {:>18}\n",
                "Features", "Accuracy", "Precision", "Recall"
            ));
            for row in rows {
                output.push_str(&format!("{:<44}", row.features));
                for metric in Metric::ALL {
                    match row.intervals.get(&metric) {
                        Some(ci) => output.push_str(&format!(
                            " {:>18}",
                            format!("{:.4} ± {:.4}", ci.mean, ci.error)
                        )),
                        None => output.push_str(&format!(" {:>18}", "N/A")),
                    }
                }
                output.push('\n');
            }
        }
        output
    }

    fn json_lines(&self) -> Vec<serde_json::Value> {
        let mut lines = Vec::new();
        for (tag, rows) in &self.intervals {
            for row in rows {
                lines.push(serde_json::json!({
                    "classifier": tag,
                    "features": row.features,
                    "intervals": row.intervals,
                }));
            }
        }
        lines
    }
}

fn count_table(counts: &BTreeMap<String, usize>) -> String {
    let width = counts.keys().map(String::len).max().unwrap_or(0);
    counts
        .iter()
        .map(|(name, count)| format!("  {:<width$} {:>10}\n", name, count, width = width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsets;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "jsonl".parse::<OutputFormat>().unwrap(),
            OutputFormat::JsonLines
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::JsonLines.to_string(), "jsonl");
    }

    fn summary() -> LabelSummary {
        LabelSummary {
            rows_read: 10,
            zero_duration_dropped: 2,
            labeled: 8,
            missing_tag: 1,
            classes: BTreeMap::from([("HTTPS".to_string(), 5), ("unknown".to_string(), 3)]),
            unmapped: BTreeMap::from([("Foo".to_string(), 2)]),
        }
    }

    #[test]
    fn test_export_label_summary_text() {
        let text = export(&summary(), OutputFormat::Text);
        assert!(text.contains("Zero-Duration Dropped: 2"));
        assert!(text.contains("Classes (2):"));
        assert!(text.contains("Unmapped Tags (1):"));
    }

    #[test]
    fn test_export_label_summary_json() {
        let json = export(&summary(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["labeled"], 8);
        assert_eq!(value["classes"]["HTTPS"], 5);
    }

    #[test]
    fn test_catalog_exports() {
        let all = subsets::all();
        let catalog = SubsetCatalog::from(all.as_slice());

        let text = export(&catalog, OutputFormat::Text);
        assert_eq!(text.lines().count(), 10);
        assert!(text.contains("duration_dPkts_dOctets_srcportcount"));

        let jsonl = export(&catalog, OutputFormat::JsonLines);
        assert_eq!(jsonl.lines().count(), 8);
        let first: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
        assert_eq!(first["label"], "base");
    }

    #[test]
    fn test_breakdown_text_totals() {
        let breakdown = ClassBreakdown {
            partitions: vec!["Train".to_string(), "Test 1".to_string()],
            rows: BTreeMap::from([
                ("HTTPS".to_string(), vec![10, 20]),
                ("Chat".to_string(), vec![1, 2]),
            ]),
        };
        let text = breakdown_text(&breakdown);
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("Total"));
        assert!(last.ends_with("      11       22"));
    }
}
