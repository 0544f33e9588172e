//! Read/write trained artifacts.
//!
//! An artifact directory holds two pretty-printed JSON files:
//! - `preprocessor.json`: the feature schema plus the fitted statistics
//! - `model.json`: the selected estimator (coefficients or tree node tables)
//!
//! Floats are written with full round-trip precision, so a reloaded pair
//! produces bit-identical predictions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::domain::RawRecord;
use crate::error::AppError;
use crate::models::FittedModel;
use crate::transform::FeatureTransformer;

pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const MODEL_FILE: &str = "model.json";

/// Serialize `value` to `path`, creating parent directories.
pub fn save<T: Serialize>(value: &T, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::persistence(path, format!("Failed to create directory: {e}")))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::persistence(path, format!("Failed to serialize: {e}")))?;
    fs::write(path, json).map_err(|e| AppError::persistence(path, format!("Failed to write: {e}")))
}

/// Deserialize a value previously written by [`save`].
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::persistence(path, format!("Failed to read: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::persistence(path, format!("Corrupt or incompatible payload: {e}")))
}

/// The fitted transformer and model, ready for inference.
#[derive(Debug, Clone)]
pub struct TrainedArtifact {
    pub transformer: FeatureTransformer,
    pub model: FittedModel,
    pub preprocessor_path: PathBuf,
    pub model_path: PathBuf,
}

impl TrainedArtifact {
    /// Model output for one listing, on the log scale.
    pub fn predict_log_price(&self, record: &RawRecord) -> Result<f64, AppError> {
        let features = self.transformer.transform_record(record)?;
        Ok(self.model.predict_row(&features))
    }
}

/// Conventional file layout inside one artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.dir.join(PREPROCESSOR_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Write both files, overwriting any previous run.
    pub fn save(
        &self,
        transformer: &FeatureTransformer,
        model: &FittedModel,
    ) -> Result<TrainedArtifact, AppError> {
        let preprocessor_path = self.preprocessor_path();
        let model_path = self.model_path();
        if !transformer.is_fitted() {
            return Err(AppError::persistence(
                &preprocessor_path,
                "refusing to save an unfitted transformer",
            ));
        }

        save(transformer, &preprocessor_path)?;
        save(model, &model_path)?;
        info!(
            preprocessor = %preprocessor_path.display(),
            model = %model_path.display(),
            "saved artifacts"
        );

        Ok(TrainedArtifact {
            transformer: transformer.clone(),
            model: model.clone(),
            preprocessor_path,
            model_path,
        })
    }

    /// Read both files and check they fit together.
    pub fn load(&self) -> Result<TrainedArtifact, AppError> {
        let preprocessor_path = self.preprocessor_path();
        let model_path = self.model_path();

        let transformer: FeatureTransformer = load(&preprocessor_path)?;
        if !transformer.is_fitted() {
            return Err(AppError::persistence(
                &preprocessor_path,
                "transformer in artifact is not fitted",
            ));
        }
        let model: FittedModel = load(&model_path)?;
        model
            .validate(transformer.spec().width())
            .map_err(|e| AppError::persistence(&model_path, e))?;

        Ok(TrainedArtifact {
            transformer,
            model,
            preprocessor_path,
            model_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, FeatureSpec};
    use crate::models::{BoostingModel, ForestModel, LinearModel, TreeParams};
    use crate::transform::Subset;
    use nalgebra::DVector;

    fn fitted_transformer() -> (FeatureTransformer, Dataset) {
        let records: Vec<RawRecord> = (0..40)
            .map(|i| {
                RawRecord::from_pairs([
                    ("city", if i % 2 == 0 { "NYC" } else { "Chicago" }.to_string()),
                    ("accommodates", (1 + i % 6).to_string()),
                    ("amenities", "TV,Wifi".repeat(1 + i % 3)),
                    ("host_response_rate", format!("{}%", 50 + i)),
                    ("log_price", format!("{}", 4.0 + (i as f64) * 0.037)),
                ])
            })
            .collect();
        let ds = Dataset::new(
            ["city", "accommodates", "amenities", "host_response_rate", "log_price"]
                .map(String::from)
                .to_vec(),
            records,
        );
        let mut t = FeatureTransformer::new(FeatureSpec::builtin().unwrap());
        t.fit(&ds).unwrap();
        (t, ds)
    }

    #[test]
    fn save_then_load_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested/artifacts"));
        let (transformer, ds) = fitted_transformer();
        let train = transformer.apply(&ds, Subset::Train).unwrap();

        let forest = ForestModel::fit(
            &train.features,
            &train.target,
            4,
            TreeParams {
                max_depth: Some(4),
                min_samples_split: 2,
            },
            9,
        )
        .unwrap();
        let boosting = BoostingModel::fit(&train.features, &train.target, 5, 0.1, 2).unwrap();
        let linear = LinearModel {
            coefficients: (0..train.n_features()).map(|j| 0.1 * j as f64 - 0.3).collect(),
            intercept: 4.321_987_654_321,
        };

        for model in [
            FittedModel::RandomForest(forest),
            FittedModel::GradientBoosting(boosting),
            FittedModel::Linear(linear),
        ] {
            let saved = store.save(&transformer, &model).unwrap();
            let loaded = store.load().unwrap();

            assert_eq!(loaded.transformer, transformer);
            assert_eq!(loaded.model, model);
            for rec in &ds.records {
                let a = saved.predict_log_price(rec).unwrap();
                let b = loaded.predict_log_price(rec).unwrap();
                assert_eq!(a.to_bits(), b.to_bits());
            }
            let a: DVector<f64> = model.predict(&train.features);
            let b = loaded.model.predict(&train.features);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn missing_directory_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::new(dir.path().join("nope")).load().unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn corrupt_payload_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (transformer, _) = fitted_transformer();
        save(&transformer, &store.preprocessor_path()).unwrap();
        fs::write(store.model_path(), "{\"kind\": \"linear\", \"coefficients\": [1.0]").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, AppError::Persistence { .. }));
    }

    #[test]
    fn width_mismatch_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (transformer, _) = fitted_transformer();
        let model = FittedModel::Linear(LinearModel {
            coefficients: vec![1.0],
            intercept: 0.0,
        });
        store.save(&transformer, &model).unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn unfitted_transformer_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let t = FeatureTransformer::new(FeatureSpec::builtin().unwrap());
        let model = FittedModel::Linear(LinearModel {
            coefficients: vec![],
            intercept: 0.0,
        });
        assert!(store.save(&t, &model).is_err());
    }
}
