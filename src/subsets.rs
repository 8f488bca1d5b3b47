//! Feature subset catalog.
//!
//! Experiments run over the base flow features plus every non-empty
//! combination of the three engineered source-address features, numbered
//! 0 to 7. A subset's identifier (its names joined with `_`) is the prefix of
//! every result file the experiment driver writes for it.

use serde::Serialize;

use crate::dataset::Field;

/// Flow features present in every subset.
pub const BASE_FEATURES: [Field; 3] = [Field::Duration, Field::Packets, Field::Octets];

/// Engineered feature combinations, in catalog order after the base set.
const COMBINATIONS: [&[Field]; 8] = [
    &[],
    &[Field::DstAddrCount],
    &[Field::SrcPortCount],
    &[Field::DstPortUnique],
    &[Field::DstAddrCount, Field::SrcPortCount],
    &[Field::DstAddrCount, Field::DstPortUnique],
    &[Field::SrcPortCount, Field::DstPortUnique],
    &[Field::DstAddrCount, Field::SrcPortCount, Field::DstPortUnique],
];

/// Number of subsets in the catalog.
pub const SUBSET_COUNT: usize = COMBINATIONS.len();

/// One experiment feature configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSubset {
    pub number: usize,
    pub features: Vec<String>,
}

impl FeatureSubset {
    /// Looks up a subset by catalog number.
    pub fn get(number: usize) -> Option<Self> {
        COMBINATIONS.get(number).map(|extra| Self {
            number,
            features: BASE_FEATURES
                .iter()
                .chain(extra.iter())
                .map(|f| f.name().to_string())
                .collect(),
        })
    }

    /// Looks up a subset by its file-name identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        all().into_iter().find(|s| s.id() == id)
    }

    /// File-name identifier, e.g. `duration_dPkts_dOctets_dstaddrcount`.
    pub fn id(&self) -> String {
        self.features.join("_")
    }

    /// Short label used in report tables, e.g. `base + (dstaddrcount)`.
    pub fn label(&self) -> String {
        let extra = &self.features[BASE_FEATURES.len()..];
        if extra.is_empty() {
            "base".to_string()
        } else {
            format!("base + ({})", extra.join(", "))
        }
    }
}

impl std::fmt::Display for FeatureSubset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.number, self.features.join(", "))
    }
}

/// Every subset, in catalog order.
pub fn all() -> Vec<FeatureSubset> {
    (0..SUBSET_COUNT).filter_map(FeatureSubset::get).collect()
}

/// The union of all subset features; what the partition stage standardizes.
pub fn all_features() -> Vec<String> {
    BASE_FEATURES
        .iter()
        .chain(Field::ENGINEERED.iter())
        .map(|f| f.name().to_string())
        .collect()
}
