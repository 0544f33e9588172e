//! Shared training and prediction workflows.
//!
//! Keeping these in one place keeps `app` focused on argument handling and
//! printing:
//! CSV ingest -> split -> fit transformer on train -> transform all subsets
//! -> model selection -> save artifacts

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::data::split_dataset;
use crate::domain::{FeatureSpec, PredictConfig, RawRecord, TrainConfig};
use crate::error::AppError;
use crate::fit::{Catalog, Selection, select};
use crate::io::{
    ArtifactStore, HistoryEntry, HistoryStore, IngestedData, TrainedArtifact, load_dataset,
    record_from_json, write_dataset_csv,
};
use crate::transform::{FeatureTransformer, Subset};

/// All computed outputs of a single `lp train` run.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub rows_read: usize,
    pub rows_usable: usize,
    pub rows_skipped: usize,
    /// Train, validation and test sizes straight out of the splitter.
    pub split_sizes: [usize; 3],
    /// Train rows left after the outlier cap.
    pub train_rows: usize,
    pub target_cap: f64,
    pub selection: Selection,
    pub artifact: TrainedArtifact,
    /// Split CSVs written next to the artifacts, if any.
    pub split_paths: Vec<PathBuf>,
}

/// One priced listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub record: RawRecord,
    pub log_price: f64,
    pub price: f64,
}

/// Execute the full training pipeline and persist the result.
pub fn run_training(config: &TrainConfig) -> Result<TrainingRun, AppError> {
    let spec = FeatureSpec::load(config.schema_path.as_deref())?;
    let ingest = load_dataset(&config.data_path)?;
    run_training_on(ingest, spec, config)
}

/// Training pipeline on an already-ingested dataset.
pub fn run_training_on(
    ingest: IngestedData,
    spec: FeatureSpec,
    config: &TrainConfig,
) -> Result<TrainingRun, AppError> {
    let dataset = ingest.dataset;

    // 1) Split.
    let parts = split_dataset(&dataset, config.ratios, config.seed)?;
    let split_sizes = [parts.train.len(), parts.validation.len(), parts.test.len()];
    info!(
        train = split_sizes[0],
        validation = split_sizes[1],
        test = split_sizes[2],
        seed = config.seed,
        "split dataset"
    );

    let mut split_paths = Vec::new();
    if config.write_splits {
        for (name, subset) in [
            ("raw_data.csv", &dataset),
            ("train_data.csv", &parts.train),
            ("val_data.csv", &parts.validation),
            ("test_data.csv", &parts.test),
        ] {
            let path = config.artifact_dir.join(name);
            write_dataset_csv(&path, subset)?;
            split_paths.push(path);
        }
    }

    // 2) Fit the transformer on train only, then apply it everywhere.
    let mut transformer = FeatureTransformer::new(spec).with_outlier_quantile(config.outlier_quantile);
    let train = transformer.fit_transform(&parts.train)?;
    let validation = transformer.apply(&parts.validation, Subset::Validation)?;
    let test = transformer.apply(&parts.test, Subset::Test)?;
    let (train_rows, target_cap) = transformer
        .params()
        .map(|p| (p.train_rows, p.target_cap))
        .ok_or_else(|| AppError::transformation("transformer lost its fitted state"))?;

    // 3) Select the best model.
    let catalog = Catalog::for_kind(config.catalog);
    let selection = select(&catalog, &train, &validation, &test, config.seed)?;

    // 4) Persist.
    let artifact = ArtifactStore::new(&config.artifact_dir).save(&transformer, &selection.best.model)?;

    Ok(TrainingRun {
        rows_read: ingest.rows_read,
        rows_usable: dataset.len(),
        rows_skipped: ingest.row_errors.len(),
        split_sizes,
        train_rows,
        target_cap,
        selection,
        artifact,
        split_paths,
    })
}

/// Price one or more listings with saved artifacts.
///
/// When `config.record_history` is set every prediction is appended to `history`.
pub fn run_predict(config: &PredictConfig, history: &dyn HistoryStore) -> Result<Vec<Prediction>, AppError> {
    let records = match (&config.record_json, &config.input_csv) {
        (Some(json), None) => vec![record_from_json(json)?],
        (None, Some(path)) => load_dataset(path)?.dataset.records,
        (Some(_), Some(_)) => {
            return Err(AppError::Config(
                "Pass either a JSON record or an input CSV, not both.".into(),
            ));
        }
        (None, None) => {
            return Err(AppError::Config(
                "Nothing to predict: pass --record or --input.".into(),
            ));
        }
    };

    let artifact = ArtifactStore::new(&config.artifact_dir).load()?;
    predict_records(&artifact, records, config.record_history, history)
}

/// Run loaded artifacts over `records`.
pub fn predict_records(
    artifact: &TrainedArtifact,
    records: Vec<RawRecord>,
    record_history: bool,
    history: &dyn HistoryStore,
) -> Result<Vec<Prediction>, AppError> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let log_price = artifact.predict_log_price(&record)?;
        let price = log_price.exp();
        if record_history {
            history.append(&HistoryEntry::from_record(&record, price, Utc::now()))?;
        }
        out.push(Prediction {
            record,
            log_price,
            price,
        });
    }
    info!(count = out.len(), "priced listings");
    Ok(out)
}
