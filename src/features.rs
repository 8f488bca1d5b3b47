//! Per-source-address behavioral features (BLINC).
//!
//! For every source address we count the distinct destination addresses,
//! source ports and destination ports it used, then broadcast those counts
//! back onto each of its flows:
//!
//! ```text
//! dstaddrcount[a]  = |{ dstaddr : srcaddr = a }|
//! srcportcount[a]  = |{ srcport : srcaddr = a }|
//! dstportunique[a] = |{ dstport : srcaddr = a }|
//! ```
//!
//! One grouping pass over the rows, one reduction per group and one lookup
//! pass, so the cost is linear in the number of flows.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::dataset::{AddressCounts, Dataset, Field};
use crate::error::DatasetError;

/// Aggregate behavior of a single source address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProfile {
    pub srcaddr: String,
    pub flows: usize,
    pub counts: AddressCounts,
}

/// A reusable transformation that adds columns to a flow dataset.
pub trait Augmentation {
    /// Columns this augmentation writes.
    fn columns(&self) -> &[Field];

    /// Adds (or recomputes) the columns on every record.
    fn augment(&self, dataset: &mut Dataset) -> Result<(), DatasetError>;
}

/// The BLINC source-address counts as an [`Augmentation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceAddressFeatures;

impl Augmentation for SourceAddressFeatures {
    fn columns(&self) -> &[Field] {
        &Field::ENGINEERED
    }

    fn augment(&self, dataset: &mut Dataset) -> Result<(), DatasetError> {
        if dataset.is_empty() {
            return Err(DatasetError::Empty(dataset.name().to_string()));
        }

        let profiles = profile_sources(dataset);
        for record in dataset.records_mut() {
            record.counts = profiles.get(&record.srcaddr).map(|p| p.counts);
        }
        for field in self.columns() {
            dataset.append_column(*field);
        }

        info!(
            "Augmented {} flows with features from {} source addresses",
            dataset.len(),
            profiles.len()
        );
        Ok(())
    }
}

#[derive(Default)]
struct DistinctSets<'a> {
    flows: usize,
    dstaddrs: HashSet<&'a str>,
    srcports: HashSet<u16>,
    dstports: HashSet<u16>,
}

/// Builds one [`SourceProfile`] per distinct source address.
pub fn profile_sources(dataset: &Dataset) -> HashMap<String, SourceProfile> {
    let mut groups: HashMap<&str, DistinctSets<'_>> = HashMap::new();

    for record in dataset.records() {
        let sets = groups.entry(record.srcaddr.as_str()).or_default();
        sets.flows += 1;
        sets.dstaddrs.insert(record.dstaddr.as_str());
        sets.srcports.insert(record.srcport);
        sets.dstports.insert(record.dstport);
    }

    debug!("Grouped {} flows into {} sources", dataset.len(), groups.len());

    groups
        .into_iter()
        .map(|(srcaddr, sets)| {
            let profile = SourceProfile {
                srcaddr: srcaddr.to_string(),
                flows: sets.flows,
                counts: AddressCounts {
                    dstaddrcount: sets.dstaddrs.len(),
                    srcportcount: sets.srcports.len(),
                    dstportunique: sets.dstports.len(),
                },
            };
            (profile.srcaddr.clone(), profile)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FlowRecord;

    fn two_sources() -> Dataset {
        let records = vec![
            FlowRecord::new(0, "A", "10.0.0.1", 4000, 80, 1.0, 1, 100),
            FlowRecord::new(1, "B", "10.0.0.9", 5000, 22, 1.0, 1, 100),
            FlowRecord::new(2, "A", "10.0.0.1", 4000, 443, 1.0, 1, 100),
            FlowRecord::new(3, "A", "10.0.0.2", 4000, 53, 1.0, 1, 100),
        ];
        Dataset::from_records("two", records)
    }

    #[test]
    fn test_profile_counts() {
        let profiles = profile_sources(&two_sources());

        assert_eq!(profiles.len(), 2);
        let a = &profiles["A"];
        assert_eq!(a.flows, 3);
        assert_eq!(
            a.counts,
            AddressCounts {
                dstaddrcount: 2,
                srcportcount: 1,
                dstportunique: 3
            }
        );
    }

    #[test]
    fn test_augment_broadcasts_to_every_row() {
        let mut dataset = two_sources();
        SourceAddressFeatures.augment(&mut dataset).unwrap();

        for record in dataset.records() {
            let counts = record.counts.unwrap();
            if record.srcaddr == "A" {
                assert_eq!((counts.dstaddrcount, counts.srcportcount, counts.dstportunique), (2, 1, 3));
            } else {
                assert_eq!((counts.dstaddrcount, counts.srcportcount, counts.dstportunique), (1, 1, 1));
            }
        }
    }

    #[test]
    fn test_augment_preserves_rows_and_appends_columns() {
        let mut dataset = two_sources();
        let before: Vec<usize> = dataset.records().iter().map(|r| r.index).collect();

        SourceAddressFeatures.augment(&mut dataset).unwrap();

        let after: Vec<usize> = dataset.records().iter().map(|r| r.index).collect();
        assert_eq!(before, after);
        let header = dataset.header();
        assert_eq!(
            &header[header.len() - 3..],
            &["dstaddrcount", "srcportcount", "dstportunique"]
        );
    }

    #[test]
    fn test_augment_twice_is_stable() {
        let mut dataset = two_sources();
        SourceAddressFeatures.augment(&mut dataset).unwrap();
        let first = dataset.records().to_vec();
        let width = dataset.header().len();

        SourceAddressFeatures.augment(&mut dataset).unwrap();

        assert_eq!(dataset.records(), first.as_slice());
        assert_eq!(dataset.header().len(), width);
    }

    #[test]
    fn test_counts_bounded_by_flow_count() {
        let dataset = two_sources();
        for profile in profile_sources(&dataset).values() {
            assert!(profile.counts.dstaddrcount <= profile.flows);
            assert!(profile.counts.srcportcount <= profile.flows);
            assert!(profile.counts.dstportunique <= profile.flows);
        }
    }

    #[test]
    fn test_augmented_file_round_trip() {
        let mut dataset = two_sources();
        SourceAddressFeatures.augment(&mut dataset).unwrap();

        let mut out = Vec::new();
        dataset.write(&mut out).unwrap();
        let reloaded = Dataset::read("reloaded", out.as_slice()).unwrap();

        assert_eq!(reloaded.records()[0].counts, dataset.records()[0].counts);
        assert!(reloaded.has_column(Field::DstPortUnique));
    }
}
