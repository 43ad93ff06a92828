//! Linear crowd-level regressor.
//!
//! Ridge-regularised least squares over [`TimeFeatures::regression_vector`],
//! solved through the normal equations. The fitted model is persisted as a
//! JSON document carrying a SHA-256 fingerprint of its parameters; loading
//! rejects documents whose fingerprint does not match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::features::{TimeFeatures, FEATURE_COUNT};
use crate::api::CrowdReport;

/// Fewest reports a model may be trained on.
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Ridge penalty applied to every coefficient except the intercept.
pub const RIDGE_LAMBDA: f64 = 1e-3;

const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Not enough crowd reports to train (need {required}, have {actual})")]
    InsufficientData { required: usize, actual: usize },

    #[error("Training data is degenerate; normal equations are singular")]
    Singular,

    #[error("Expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite value")]
    NonFinite,

    #[error("Model fingerprint mismatch")]
    FingerprintMismatch,

    #[error("Model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdModel {
    coefficients: Vec<f64>,
    samples: usize,
    r_squared: f64,
    trained_at: DateTime<Utc>,
    fingerprint: String,
}

impl CrowdModel {
    /// Fit a model on stored reports, using each report's timestamp as the
    /// feature source and its crowd level as the target.
    pub fn train(reports: &[CrowdReport], trained_at: DateTime<Utc>) -> Result<Self, ModelError> {
        let rows: Vec<([f64; FEATURE_COUNT], f64)> = reports
            .iter()
            .map(|r| {
                (
                    TimeFeatures::from_time(r.created_at).regression_vector(),
                    r.crowd_level.as_f64(),
                )
            })
            .collect();
        Self::fit(&rows, trained_at)
    }

    /// Fit a model on `(features, target)` rows.
    pub fn fit(
        rows: &[([f64; FEATURE_COUNT], f64)],
        trained_at: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        if rows.len() < MIN_TRAINING_SAMPLES {
            return Err(ModelError::InsufficientData {
                required: MIN_TRAINING_SAMPLES,
                actual: rows.len(),
            });
        }

        // Normal equations: (XᵀX + λI') w = Xᵀy
        let mut xtx = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
        let mut xty = [0.0; FEATURE_COUNT];
        for (x, y) in rows {
            for i in 0..FEATURE_COUNT {
                xty[i] += x[i] * y;
                for j in 0..FEATURE_COUNT {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += RIDGE_LAMBDA;
        }

        let coefficients = solve(xtx, xty)?.to_vec();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let r_squared = r_squared(&coefficients, rows);
        let fingerprint = fingerprint(&coefficients, rows.len(), r_squared, trained_at);

        Ok(Self {
            coefficients,
            samples: rows.len(),
            r_squared,
            trained_at,
            fingerprint,
        })
    }

    /// Predict a (continuous, unclamped) crowd level.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::FeatureMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let value = dot(&self.coefficients, features);
        if !value.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(value)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Coefficient of determination on the training set.
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Write the model as JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Saved crowd model to {}", path.display());
        Ok(())
    }

    /// Read a model written by [`CrowdModel::save`] and verify its fingerprint.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path)?;
        let model: CrowdModel = serde_json::from_str(&content)?;
        model.verify()?;
        Ok(model)
    }

    fn verify(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ModelError::FeatureMismatch {
                expected: FEATURE_COUNT,
                actual: self.coefficients.len(),
            });
        }
        let expected = fingerprint(
            &self.coefficients,
            self.samples,
            self.r_squared,
            self.trained_at,
        );
        if expected != self.fingerprint {
            return Err(ModelError::FingerprintMismatch);
        }
        Ok(())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn r_squared(coefficients: &[f64], rows: &[([f64; FEATURE_COUNT], f64)]) -> f64 {
    let n = rows.len() as f64;
    let mean = rows.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (ss_res, ss_tot) = rows.iter().fold((0.0, 0.0), |(res, tot), (x, y)| {
        let err = y - dot(coefficients, x);
        (res + err * err, tot + (y - mean) * (y - mean))
    });
    if ss_tot <= PIVOT_EPSILON {
        // Constant targets: a perfect fit explains everything.
        return if ss_res <= PIVOT_EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn fingerprint(
    coefficients: &[f64],
    samples: usize,
    r_squared: f64,
    trained_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    for c in coefficients {
        hasher.update(c.to_le_bytes());
    }
    hasher.update((samples as u64).to_le_bytes());
    hasher.update(r_squared.to_le_bytes());
    hasher.update(trained_at.timestamp_micros().to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Gaussian elimination with partial pivoting.
fn solve(
    mut a: [[f64; FEATURE_COUNT]; FEATURE_COUNT],
    mut b: [f64; FEATURE_COUNT],
) -> Result<[f64; FEATURE_COUNT], ModelError> {
    for col in 0..FEATURE_COUNT {
        let pivot = (col..FEATURE_COUNT)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ModelError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..FEATURE_COUNT {
            let factor = a[row][col] / a[col][col];
            for k in col..FEATURE_COUNT {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; FEATURE_COUNT];
    for row in (0..FEATURE_COUNT).rev() {
        let tail: f64 = (row + 1..FEATURE_COUNT).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn synthetic_rows() -> Vec<([f64; FEATURE_COUNT], f64)> {
        // Two weeks of hourly observations following an exact linear rule.
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..24 * 14)
            .map(|h| {
                let x = TimeFeatures::from_time(start + Duration::hours(h)).regression_vector();
                let y = 2.5 + 0.5 * x[1] - 0.3 * x[2] - 0.4 * x[3] + 1.2 * x[4] + 1.6 * x[5];
                (x, y)
            })
            .collect()
    }

    #[test]
    fn test_fit_recovers_linear_rule() {
        let model = CrowdModel::fit(&synthetic_rows(), Utc::now()).unwrap();
        let expected = [2.5, 0.5, -0.3, -0.4, 1.2, 1.6];
        for (c, e) in model.coefficients().iter().zip(expected) {
            assert!((c - e).abs() < 1e-2, "coefficient {} vs {}", c, e);
        }
        assert!(model.r_squared() > 0.999);
        assert_eq!(model.samples(), 24 * 14);
        assert_eq!(model.fingerprint().len(), 64);
    }

    #[test]
    fn test_insufficient_data() {
        let rows = synthetic_rows();
        let err = CrowdModel::fit(&rows[..9], Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InsufficientData {
                required: 10,
                actual: 9
            }
        ));
    }

    #[test]
    fn test_predict_checks_feature_length() {
        let model = CrowdModel::fit(&synthetic_rows(), Utc::now()).unwrap();
        assert!(matches!(
            model.predict(&[1.0, 0.0]),
            Err(ModelError::FeatureMismatch { .. })
        ));
        assert!(matches!(
            model.predict(&[f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Err(ModelError::NonFinite)
        ));
    }

    #[test]
    fn test_constant_targets() {
        let rows: Vec<_> = synthetic_rows().into_iter().map(|(x, _)| (x, 3.0)).collect();
        let model = CrowdModel::fit(&rows, Utc::now()).unwrap();
        let x = rows[5].0;
        assert!((model.predict(&x).unwrap() - 3.0).abs() < 1e-6);
        assert_eq!(model.r_squared(), 1.0);
    }

    #[test]
    fn test_save_load_and_tamper_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("crowd.json");
        let model = CrowdModel::fit(&synthetic_rows(), Utc::now()).unwrap();
        model.save(&path).unwrap();

        let loaded = CrowdModel::load(&path).unwrap();
        assert_eq!(loaded, model);

        let mut doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        doc["coefficients"][0] = serde_json::json!(9.0);
        fs::write(&path, doc.to_string()).unwrap();
        assert!(matches!(
            CrowdModel::load(&path),
            Err(ModelError::FingerprintMismatch)
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            CrowdModel::load(&path),
            Err(ModelError::Serialization(_))
        ));
    }
}
