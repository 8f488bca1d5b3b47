//! Stratified train / k-way test partitioning with standardization.
//!
//! # Procedure
//!
//! 1. Group rows by class, visiting classes in sorted order.
//! 2. Shuffle each class with a ChaCha RNG seeded once per run and cut
//!    `round(train_fraction * n)` rows (clamped to `1..n-1`) into train.
//!    The remaining rows of every class, in class order, form the test pool.
//! 3. Row `i` of the test pool goes to test subset `(i mod N) + 1`, so with a
//!    pool of `q * N + r` rows the first `r` subsets hold one extra row.
//! 4. Fit a [`ScalingTransform`] on the raw train features only and apply it
//!    to train and every test subset.
//!
//! For a fixed seed and input order the assignment is identical between runs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{Column, Dataset, Field};
use crate::error::{DatasetError, PartitionError};
use crate::scaling::ScalingTransform;
use crate::subsets;

/// File name of the persisted scaling transform.
pub const SCALER_FILE: &str = "scaler.bin";
/// File name of the per-class partition size table.
pub const BREAKDOWN_FILE: &str = "train_test_split.csv";
/// File name of the run manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Partitioning parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Number of test subsets
    pub num_tests: usize,
    /// Seed for the per-class shuffle
    pub seed: u64,
    /// Share of each class assigned to train
    pub train_fraction: f64,
    /// Feature columns to standardize, in output order
    pub features: Vec<String>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            num_tests: 6,
            seed: 15,
            train_fraction: 0.33,
            features: subsets::all_features(),
        }
    }
}

impl PartitionConfig {
    pub fn validate(&self) -> Result<(), PartitionError> {
        if self.num_tests == 0 {
            return Err(PartitionError::NoTestSubsets);
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(PartitionError::InvalidTrainFraction(self.train_fraction));
        }
        if self.features.is_empty() {
            return Err(PartitionError::NoFeatures);
        }
        Ok(())
    }
}

/// Which slice of the dataset a partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PartitionKind {
    Train,
    /// One-based test subset number
    Test(usize),
}

impl PartitionKind {
    pub fn file_name(&self) -> String {
        match self {
            Self::Train => "train_scale.csv".to_string(),
            Self::Test(n) => format!("test{}_scale.csv", n),
        }
    }
}

impl std::fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Train => write!(f, "Train"),
            Self::Test(n) => write!(f, "Test {}", n),
        }
    }
}

/// Standardized rows of one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub kind: PartitionKind,
    /// Original row index of each row
    pub indices: Vec<usize>,
    pub labels: Vec<String>,
    /// Feature values in [`PartitionSet::features`] order
    pub values: Vec<Vec<f64>>,
}

impl Partition {
    fn new(kind: PartitionKind) -> Self {
        Self {
            kind,
            indices: Vec::new(),
            labels: Vec::new(),
            values: Vec::new(),
        }
    }

    fn push(&mut self, row: &RawRow) {
        self.indices.push(row.index);
        self.labels.push(row.label.clone());
        self.values.push(row.values.clone());
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Writes feature columns followed by `class`.
    pub fn write<W: Write>(&self, features: &[String], writer: W) -> Result<(), DatasetError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(features.iter().map(String::as_str).chain([Field::Class.name()]))?;
        for (values, label) in self.values.iter().zip(&self.labels) {
            let row = values.iter().map(|v| v.to_string()).chain([label.clone()]);
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Output of one partitioning run.
#[derive(Debug, Clone)]
pub struct PartitionSet {
    pub features: Vec<String>,
    pub train: Partition,
    pub tests: Vec<Partition>,
    pub transform: ScalingTransform,
}

/// Paths written by [`PartitionSet::save`].
#[derive(Debug, Clone, Serialize)]
pub struct PartitionArtifacts {
    pub partitions: Vec<PathBuf>,
    pub scaler: PathBuf,
    pub breakdown: PathBuf,
    pub manifest: PathBuf,
}

/// Run parameters and sizes, saved next to the scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub seed: u64,
    pub num_tests: usize,
    pub train_fraction: f64,
    pub features: Vec<String>,
    pub train_rows: usize,
    pub test_rows: Vec<usize>,
    pub scaler_fingerprint: String,
}

impl PartitionSet {
    /// All partitions, train first.
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        std::iter::once(&self.train).chain(self.tests.iter())
    }

    pub fn breakdown(&self) -> ClassBreakdown {
        ClassBreakdown::from_partitions(self.partitions())
    }

    pub fn manifest(&self, source: &str, config: &PartitionConfig) -> PartitionManifest {
        PartitionManifest {
            created_at: Utc::now(),
            source: source.to_string(),
            seed: config.seed,
            num_tests: self.tests.len(),
            train_fraction: config.train_fraction,
            features: self.features.clone(),
            train_rows: self.train.len(),
            test_rows: self.tests.iter().map(Partition::len).collect(),
            scaler_fingerprint: self.transform.fingerprint().to_string(),
        }
    }

    /// Writes partition CSVs to `output_dir` and the scaler, class breakdown
    /// and manifest to `metadata_dir`.
    pub fn save(
        &self,
        output_dir: &Path,
        metadata_dir: &Path,
        manifest: &PartitionManifest,
    ) -> Result<PartitionArtifacts> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        std::fs::create_dir_all(metadata_dir)
            .with_context(|| format!("Failed to create {}", metadata_dir.display()))?;

        let mut partitions = Vec::new();
        for partition in self.partitions() {
            let path = output_dir.join(partition.kind.file_name());
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            partition
                .write(&self.features, file)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Wrote {} rows to {}", partition.len(), path.display());
            partitions.push(path);
        }

        let scaler = metadata_dir.join(SCALER_FILE);
        self.transform
            .save(&scaler)
            .with_context(|| format!("Failed to save {}", scaler.display()))?;

        let breakdown = metadata_dir.join(BREAKDOWN_FILE);
        let file = File::create(&breakdown)
            .with_context(|| format!("Failed to create {}", breakdown.display()))?;
        self.breakdown().write_csv(file)?;

        let manifest_path = metadata_dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        info!(
            "Saved {} partitions to {} and metadata to {}",
            partitions.len(),
            output_dir.display(),
            metadata_dir.display()
        );

        Ok(PartitionArtifacts {
            partitions,
            scaler,
            breakdown,
            manifest: manifest_path,
        })
    }
}

/// Row counts per class for train and each test subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassBreakdown {
    pub partitions: Vec<String>,
    /// Class label to one count per partition
    pub rows: BTreeMap<String, Vec<usize>>,
}

impl ClassBreakdown {
    pub fn from_partitions<'a>(partitions: impl Iterator<Item = &'a Partition>) -> Self {
        let partitions: Vec<&Partition> = partitions.collect();
        let mut rows: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (col, partition) in partitions.iter().enumerate() {
            for (class, count) in partition.class_counts() {
                rows.entry(class).or_insert_with(|| vec![0; partitions.len()])[col] = count;
            }
        }
        Self {
            partitions: partitions.iter().map(|p| p.kind.to_string()).collect(),
            rows,
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(std::iter::once("class").chain(self.partitions.iter().map(String::as_str)))?;
        for (class, counts) in &self.rows {
            wtr.write_record(
                std::iter::once(class.clone()).chain(counts.iter().map(|c| c.to_string())),
            )?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

struct RawRow {
    index: usize,
    label: String,
    values: Vec<f64>,
}

/// Splits labeled datasets according to a [`PartitionConfig`].
#[derive(Debug, Clone)]
pub struct Partitioner {
    config: PartitionConfig,
}

impl Partitioner {
    pub fn new(config: PartitionConfig) -> Result<Self, PartitionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Train rows for a class of size `n`.
    fn train_size(&self, n: usize) -> usize {
        let target = (self.config.train_fraction * n as f64).round() as usize;
        target.clamp(1, n - 1)
    }

    pub fn split(&self, dataset: &Dataset) -> Result<PartitionSet, PartitionError> {
        let features = &self.config.features;
        let rows = extract_rows(dataset, features)?;

        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (pos, row) in rows.iter().enumerate() {
            by_class.entry(row.label.as_str()).or_default().push(pos);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut train = Partition::new(PartitionKind::Train);
        let mut pool: Vec<usize> = Vec::new();

        for (class, mut members) in by_class {
            let n = members.len();
            if n < 2 {
                return Err(PartitionError::ClassTooSmall {
                    class: class.to_string(),
                    count: n,
                });
            }
            members.shuffle(&mut rng);
            let cut = self.train_size(n);
            debug!("Class '{}': {} train, {} test", class, cut, n - cut);
            for &pos in &members[..cut] {
                train.push(&rows[pos]);
            }
            pool.extend_from_slice(&members[cut..]);
        }

        let num_tests = self.config.num_tests;
        if num_tests > pool.len() {
            return Err(PartitionError::TooManyTests {
                requested: num_tests,
                available: pool.len(),
            });
        }

        let mut tests: Vec<Partition> = (1..=num_tests)
            .map(|n| Partition::new(PartitionKind::Test(n)))
            .collect();
        for (i, &pos) in pool.iter().enumerate() {
            tests[i % num_tests].push(&rows[pos]);
        }

        let transform = ScalingTransform::fit(features, &train.values)?;
        for partition in std::iter::once(&mut train).chain(tests.iter_mut()) {
            partition.values = transform.transform(features, &partition.values)?;
        }

        info!(
            "Partitioned {} flows: {} train, {} test rows across {} subsets",
            rows.len(),
            train.len(),
            pool.len(),
            num_tests
        );

        Ok(PartitionSet {
            features: features.clone(),
            train,
            tests,
            transform,
        })
    }
}

/// Pulls the label and raw feature values of every record.
fn extract_rows(dataset: &Dataset, features: &[String]) -> Result<Vec<RawRow>, PartitionError> {
    let columns: Vec<Column> = features
        .iter()
        .map(|name| {
            dataset
                .column(name)
                .ok_or_else(|| DatasetError::MissingColumn(name.clone()))
        })
        .collect::<Result<_, _>>()?;

    let mut rows = Vec::with_capacity(dataset.len());
    for record in dataset.records() {
        let label = record
            .class
            .clone()
            .ok_or(PartitionError::MissingLabel(record.index))?;
        let mut values = Vec::with_capacity(columns.len());
        for (name, column) in features.iter().zip(&columns) {
            match dataset.numeric(record, *column).filter(|v| v.is_finite()) {
                Some(v) => values.push(v),
                None => {
                    return Err(DatasetError::InvalidValue {
                        row: record.index,
                        column: name.clone(),
                        value: match column {
                            Column::Known(field) => record.cell(*field),
                            Column::Extra(i) => record.extra.get(*i).cloned().unwrap_or_default(),
                        },
                    }
                    .into())
                }
            }
        }
        rows.push(RawRow {
            index: record.index,
            label,
            values,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::dataset::FlowRecord;
    use crate::features::{Augmentation, SourceAddressFeatures};
    use crate::error::TransformError;

    /// 300 / 150 / 51 rows of three classes, interleaved.
    fn labeled_dataset() -> Dataset {
        let mut records = Vec::new();
        let mut index = 0;
        for i in 0..300usize {
            let classes: &[&str] = match i {
                i if i < 51 => &["HTTPS", "Chat_VoIP", "Remote login"],
                i if i < 150 => &["HTTPS", "Chat_VoIP"],
                _ => &["HTTPS"],
            };
            for class in classes {
                let src = format!("10.0.{}.{}", i % 7, i % 11);
                let dst = format!("192.168.0.{}", (i * 3 + index) % 17);
                records.push(
                    FlowRecord::new(
                        index,
                        &src,
                        &dst,
                        (1024 + index % 50) as u16,
                        (index % 9) as u16,
                        0.5 + (index % 13) as f64,
                        1 + (index % 5) as u64,
                        64 * (1 + (index % 19) as u64),
                    )
                    .with_class(class),
                );
                index += 1;
            }
        }
        let mut dataset = Dataset::from_records("labeled", records);
        SourceAddressFeatures.augment(&mut dataset).unwrap();
        dataset
    }

    fn config(num_tests: usize) -> PartitionConfig {
        PartitionConfig {
            num_tests,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(PartitionConfig::default().validate().is_ok());
        assert!(matches!(
            config(0).validate(),
            Err(PartitionError::NoTestSubsets)
        ));
        let bad_fraction = PartitionConfig {
            train_fraction: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_fraction.validate(),
            Err(PartitionError::InvalidTrainFraction(_))
        ));
    }

    #[test]
    fn test_partitions_disjoint_and_cover_dataset() {
        let dataset = labeled_dataset();
        let set = Partitioner::new(config(6)).unwrap().split(&dataset).unwrap();

        let mut seen = HashSet::new();
        for partition in set.partitions() {
            for index in &partition.indices {
                assert!(seen.insert(*index), "row {} assigned twice", index);
            }
        }
        let all: HashSet<usize> = dataset.records().iter().map(|r| r.index).collect();
        assert_eq!(seen, all);
    }

    #[test]
    fn test_stratification_within_tolerance() {
        let dataset = labeled_dataset();
        let set = Partitioner::new(config(6)).unwrap().split(&dataset).unwrap();

        let total = dataset.len() as f64;
        let train_total = set.train.len() as f64;
        let test_total: usize = set.tests.iter().map(Partition::len).sum();
        let mut test_counts: BTreeMap<String, usize> = BTreeMap::new();
        for partition in &set.tests {
            for (class, count) in partition.class_counts() {
                *test_counts.entry(class).or_insert(0) += count;
            }
        }

        let train_counts = set.train.class_counts();
        for (class, count) in dataset.class_counts() {
            let expected = count as f64 / total;
            let in_train = train_counts[&class] as f64 / train_total;
            let in_test = test_counts[&class] as f64 / test_total as f64;
            assert!((in_train - expected).abs() < 0.02, "{class} train share off");
            assert!((in_test - expected).abs() < 0.02, "{class} test share off");
        }
        let train_share = train_total / total;
        assert!((train_share - 0.33).abs() < 0.01);

        let n = set.tests.len();
        for (i, partition) in set.tests.iter().enumerate() {
            let counts = partition.class_counts();
            let size = partition.len() as f64;
            for (class, count) in dataset.class_counts() {
                let pool = count - train_counts[&class];
                let in_subset = counts.get(&class).copied().unwrap_or(0);
                assert!(
                    in_subset == pool / n || in_subset == pool.div_ceil(n),
                    "test{} holds {in_subset} of {pool} {class} rows",
                    i + 1
                );
                let share = in_subset as f64 / size;
                assert!((share - count as f64 / total).abs() < 0.03, "test{} {class} share off", i + 1);
            }
        }
    }

    #[test]
    fn test_remainder_goes_to_first_subsets() {
        let dataset = labeled_dataset();
        let set = Partitioner::new(config(4)).unwrap().split(&dataset).unwrap();

        let sizes: Vec<usize> = set.tests.iter().map(Partition::len).collect();
        let pool: usize = sizes.iter().sum();
        let (q, r) = (pool / 4, pool % 4);
        for (i, size) in sizes.iter().enumerate() {
            assert_eq!(*size, if i < r { q + 1 } else { q });
        }
    }

    #[test]
    fn test_transform_fit_on_train_only() {
        let dataset = labeled_dataset();
        let partitioner = Partitioner::new(config(3)).unwrap();
        let set = partitioner.split(&dataset).unwrap();

        // Rebuild the raw train rows from the original records.
        let raw = extract_rows(&dataset, &set.features).unwrap();
        let by_index: BTreeMap<usize, &RawRow> = raw.iter().map(|r| (r.index, r)).collect();
        let train_raw: Vec<Vec<f64>> = set
            .train
            .indices
            .iter()
            .map(|i| by_index[i].values.clone())
            .collect();
        let expected = ScalingTransform::fit(&set.features, &train_raw).unwrap();
        assert_eq!(set.transform.mean(), expected.mean());
        assert_eq!(set.transform.scale(), expected.scale());

        let refit = ScalingTransform::fit(&set.features, &set.train.values).unwrap();
        for (m, s) in refit.mean().iter().zip(refit.scale()) {
            assert!(m.abs() < 1e-9);
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let dataset = labeled_dataset();
        let partitioner = Partitioner::new(config(6)).unwrap();
        let a = partitioner.split(&dataset).unwrap();
        let b = partitioner.split(&dataset).unwrap();

        for (pa, pb) in a.partitions().zip(b.partitions()) {
            let mut bytes_a = Vec::new();
            let mut bytes_b = Vec::new();
            pa.write(&a.features, &mut bytes_a).unwrap();
            pb.write(&b.features, &mut bytes_b).unwrap();
            assert_eq!(bytes_a, bytes_b);
        }

        let other_seed = Partitioner::new(PartitionConfig {
            seed: 99,
            ..config(6)
        })
        .unwrap()
        .split(&dataset)
        .unwrap();
        assert_ne!(a.train.indices, other_seed.train.indices);
    }

    #[test]
    fn test_singleton_class_rejected() {
        let mut records: Vec<FlowRecord> = (0..6)
            .map(|i| FlowRecord::new(i, "a", "b", 1, 2, 1.0 + i as f64, 1, 1).with_class("big"))
            .collect();
        records.push(FlowRecord::new(6, "a", "b", 1, 2, 1.0, 1, 1).with_class("rare"));
        let features = vec!["duration".to_string(), "dPkts".to_string()];
        let partitioner = Partitioner::new(PartitionConfig {
            num_tests: 1,
            features,
            ..Default::default()
        })
        .unwrap();

        let err = partitioner
            .split(&Dataset::from_records("rare", records))
            .unwrap_err();
        assert!(matches!(err, PartitionError::ClassTooSmall { ref class, count: 1 } if class == "rare"));
    }

    #[test]
    fn test_too_many_tests_rejected() {
        let records: Vec<FlowRecord> = (0..6)
            .map(|i| FlowRecord::new(i, "a", "b", 1, 2, 1.0 + i as f64, 1, 1).with_class("only"))
            .collect();
        let partitioner = Partitioner::new(PartitionConfig {
            num_tests: 10,
            features: vec!["duration".to_string()],
            ..Default::default()
        })
        .unwrap();

        let err = partitioner
            .split(&Dataset::from_records("small", records))
            .unwrap_err();
        assert!(matches!(err, PartitionError::TooManyTests { requested: 10, available: 4 }));
    }

    #[test]
    fn test_missing_feature_and_label() {
        let records = vec![
            FlowRecord::new(0, "a", "b", 1, 2, 1.0, 1, 1).with_class("x"),
            FlowRecord::new(1, "a", "b", 1, 2, 2.0, 1, 1),
        ];
        let dataset = Dataset::from_records("partial", records);

        let err = Partitioner::new(config(1)).unwrap().split(&dataset).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::Dataset(DatasetError::MissingColumn(ref c)) if c == "dstaddrcount"
        ));

        let base_only = PartitionConfig {
            num_tests: 1,
            features: vec!["duration".to_string()],
            ..Default::default()
        };
        let err = Partitioner::new(base_only).unwrap().split(&dataset).unwrap_err();
        assert!(matches!(err, PartitionError::MissingLabel(1)));
    }

    #[test]
    fn test_transform_rejects_other_schema() {
        let dataset = labeled_dataset();
        let set = Partitioner::new(config(2)).unwrap().split(&dataset).unwrap();

        let mut reversed = set.features.clone();
        reversed.reverse();
        let err = set.transform.transform(&reversed, &[]).unwrap_err();
        assert!(matches!(err, TransformError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_breakdown_counts() {
        let dataset = labeled_dataset();
        let set = Partitioner::new(config(3)).unwrap().split(&dataset).unwrap();
        let breakdown = set.breakdown();

        assert_eq!(breakdown.partitions, vec!["Train", "Test 1", "Test 2", "Test 3"]);
        for (class, total) in dataset.class_counts() {
            let counts = &breakdown.rows[&class];
            assert_eq!(counts.iter().sum::<usize>(), total);
        }

        let mut out = Vec::new();
        breakdown.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("class,Train,Test 1,Test 2,Test 3\n"));
        assert!(text.contains("\nRemote login,"));
    }

    #[test]
    fn test_save_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = labeled_dataset();
        let cfg = config(2);
        let set = Partitioner::new(cfg.clone()).unwrap().split(&dataset).unwrap();
        let manifest = set.manifest("labeled", &cfg);

        let artifacts = set
            .save(&dir.path().join("data"), &dir.path().join("meta"), &manifest)
            .unwrap();

        assert_eq!(artifacts.partitions.len(), 3);
        assert!(artifacts.partitions[0].ends_with("train_scale.csv"));
        assert!(artifacts.partitions[2].ends_with("test2_scale.csv"));
        let train = std::fs::read_to_string(&artifacts.partitions[0]).unwrap();
        assert_eq!(
            train.lines().next().unwrap(),
            "duration,dPkts,dOctets,dstaddrcount,srcportcount,dstportunique,class"
        );
        assert_eq!(train.lines().count(), set.train.len() + 1);

        let loaded = ScalingTransform::load(&artifacts.scaler).unwrap();
        assert_eq!(loaded, set.transform);

        let manifest: PartitionManifest =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.manifest).unwrap()).unwrap();
        assert_eq!(manifest.test_rows.len(), 2);
        assert_eq!(manifest.scaler_fingerprint, set.transform.fingerprint());
    }
}
