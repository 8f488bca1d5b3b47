//! Standardization transform fit on the training partition.
//!
//! Each feature is rescaled to `(x - mean) / scale` where `mean` and `scale`
//! are the population mean and standard deviation of the training rows.
//! A feature with zero deviation keeps scale 1 so it maps to 0 instead of
//! dividing by zero.
//!
//! The transform remembers the ordered feature names it was fit on and
//! refuses data with any other schema. Persisted artifacts carry a SHA-256
//! fingerprint of that schema which is verified on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::error::TransformError;

/// A fitted per-feature affine transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingTransform {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    samples: usize,
    fingerprint: String,
}

impl ScalingTransform {
    /// Fits mean and scale for every column of `rows`.
    ///
    /// `rows` are in `feature_names` order; every row must have one value per
    /// feature.
    pub fn fit(feature_names: &[String], rows: &[Vec<f64>]) -> Result<Self, TransformError> {
        if rows.is_empty() {
            return Err(TransformError::EmptyFit);
        }
        let width = feature_names.len();
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(TransformError::Width {
                expected: width,
                actual: row.len(),
            });
        }

        let mut mean = Vec::with_capacity(width);
        let mut scale = Vec::with_capacity(width);
        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            let mu = column.iter().mean();
            let sigma = column.iter().population_std_dev();
            mean.push(mu);
            scale.push(if sigma > 0.0 && sigma.is_finite() { sigma } else { 1.0 });
        }

        info!("Fitted scaling transform on {} rows x {} features", rows.len(), width);
        for (name, (m, s)) in feature_names.iter().zip(mean.iter().zip(scale.iter())) {
            debug!("  {:<16} mean={:.6} scale={:.6}", name, m, s);
        }

        Ok(Self {
            fingerprint: schema_fingerprint(feature_names),
            feature_names: feature_names.to_vec(),
            mean,
            scale,
            samples: rows.len(),
        })
    }

    /// Rejects data whose feature list differs from the fitted one.
    pub fn check_schema(&self, feature_names: &[String]) -> Result<(), TransformError> {
        if self.feature_names != feature_names {
            return Err(TransformError::SchemaMismatch {
                expected: self.feature_names.clone(),
                actual: feature_names.to_vec(),
            });
        }
        Ok(())
    }

    /// Standardizes a single row.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, TransformError> {
        if row.len() != self.mean.len() {
            return Err(TransformError::Width {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Standardizes rows laid out in `feature_names` order.
    pub fn transform(
        &self,
        feature_names: &[String],
        rows: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, TransformError> {
        self.check_schema(feature_names)?;
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Number of training rows the transform was fit on.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Writes the transform as a bincode blob.
    pub fn save(&self, path: &Path) -> Result<(), TransformError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        info!("Saved scaling transform to {:?}", path);
        Ok(())
    }

    /// Reads a transform written by [`ScalingTransform::save`] and verifies it.
    pub fn load(path: &Path) -> Result<Self, TransformError> {
        let reader = BufReader::new(File::open(path)?);
        let transform: ScalingTransform = bincode::deserialize_from(reader)?;
        transform.verify()?;
        debug!("Loaded scaling transform from {:?}", path);
        Ok(transform)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransformError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransformError> {
        let transform: ScalingTransform = bincode::deserialize(bytes)?;
        transform.verify()?;
        Ok(transform)
    }

    fn verify(&self) -> Result<(), TransformError> {
        let names = self.feature_names.len();
        if self.mean.len() != names || self.scale.len() != names {
            return Err(TransformError::Inconsistent {
                names,
                means: self.mean.len(),
                scales: self.scale.len(),
            });
        }
        let computed = schema_fingerprint(&self.feature_names);
        if computed != self.fingerprint {
            return Err(TransformError::Fingerprint {
                stored: self.fingerprint.clone(),
                computed,
            });
        }
        Ok(())
    }
}

/// Hex SHA-256 over the ordered feature names.
pub fn schema_fingerprint(feature_names: &[String]) -> String {
    let mut hasher = Sha256::new();
    for name in feature_names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]); // Separator
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn train_rows() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 10.0, 7.0],
            vec![2.0, 20.0, 7.0],
            vec![3.0, 30.0, 7.0],
            vec![6.0, 60.0, 7.0],
        ]
    }

    #[test]
    fn test_fit_uses_population_statistics() {
        let features = names(&["duration", "dPkts", "dOctets"]);
        let transform = ScalingTransform::fit(&features, &train_rows()).unwrap();

        assert!((transform.mean()[0] - 3.0).abs() < 1e-12);
        assert!((transform.mean()[1] - 30.0).abs() < 1e-12);
        // population variance of [1,2,3,6] = 3.5
        assert!((transform.scale()[0] - 3.5f64.sqrt()).abs() < 1e-12);
        // constant column keeps unit scale
        assert_eq!(transform.scale()[2], 1.0);
        assert_eq!(transform.samples(), 4);
    }

    #[test]
    fn test_standardized_train_has_zero_mean_unit_scale() {
        let features = names(&["duration", "dPkts", "dOctets"]);
        let rows = train_rows();
        let transform = ScalingTransform::fit(&features, &rows).unwrap();
        let scaled = transform.transform(&features, &rows).unwrap();

        let refit = ScalingTransform::fit(&features, &scaled).unwrap();
        for col in 0..2 {
            assert!(refit.mean()[col].abs() < 1e-12);
            assert!((refit.scale()[col] - 1.0).abs() < 1e-12);
        }
        assert!(scaled.iter().all(|r| r[2] == 0.0));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let features = names(&["duration", "dPkts", "dOctets"]);
        let transform = ScalingTransform::fit(&features, &train_rows()).unwrap();

        let reordered = names(&["dPkts", "duration", "dOctets"]);
        let err = transform.transform(&reordered, &train_rows()).unwrap_err();
        assert!(matches!(err, TransformError::SchemaMismatch { .. }));

        let err = transform.transform_row(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, TransformError::Width { expected: 3, actual: 2 }));
    }

    #[test]
    fn test_fit_rejects_empty_and_ragged_input() {
        let features = names(&["duration", "dPkts"]);
        assert!(matches!(
            ScalingTransform::fit(&features, &[]),
            Err(TransformError::EmptyFit)
        ));
        assert!(matches!(
            ScalingTransform::fit(&features, &[vec![1.0]]),
            Err(TransformError::Width { .. })
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        let features = names(&["duration", "dPkts", "dOctets"]);
        let transform = ScalingTransform::fit(&features, &train_rows()).unwrap();

        transform.save(&path).unwrap();
        let loaded = ScalingTransform::load(&path).unwrap();

        assert_eq!(loaded, transform);
        assert_eq!(loaded.feature_names(), features.as_slice());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_save_reports_write_failure() {
        let features = names(&["duration"]);
        let transform = ScalingTransform::fit(&features, &[vec![1.0], vec![2.0]]).unwrap();

        let err = transform.save(Path::new("/dev/full")).unwrap_err();
        assert!(matches!(err, TransformError::Io(_) | TransformError::Codec(_)));
    }

    #[test]
    fn test_tampered_fingerprint_detected() {
        let features = names(&["duration", "dPkts"]);
        let mut transform = ScalingTransform::fit(&features, &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        transform.feature_names[1] = "dOctets".to_string();

        let bytes = transform.to_bytes().unwrap();
        let err = ScalingTransform::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TransformError::Fingerprint { .. }));
    }

    #[test]
    fn test_fingerprint_depends_on_order() {
        let a = schema_fingerprint(&names(&["duration", "dPkts"]));
        let b = schema_fingerprint(&names(&["dPkts", "duration"]));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
