//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - runs training or prediction
//! - prints reports

use clap::Parser;
use tracing::debug;

use crate::cli::{Command, HistoryArgs, PredictArgs, TrainArgs};
use crate::domain::{PredictConfig, SplitRatios, TrainConfig};
use crate::error::AppError;
use crate::io::{HistoryStore, JsonlHistoryStore};

pub mod pipeline;

/// Entry point for the `lp` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is normal; anything else (bad syntax) is worth knowing.
    let dotenv = dotenvy::dotenv();

    let cli = crate::cli::Cli::parse();
    crate::logging::init_logging(cli.verbose, cli.log_json);
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(AppError::Config(format!("Failed to load .env: {e}"))),
    }

    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Predict(args) => handle_predict(args),
        Command::History(args) => handle_history(args),
    }
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(&args);
    config.ratios.validate()?;

    let run = pipeline::run_training(&config)?;
    println!("{}", crate::report::format_run_summary(&run, &config));
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = predict_config_from_args(&args);
    let history = JsonlHistoryStore::new(&config.history_path);

    for p in pipeline::run_predict(&config, &history)? {
        println!("{}", crate::report::format_prediction(p.log_price));
    }
    Ok(())
}

fn handle_history(args: HistoryArgs) -> Result<(), AppError> {
    let store = JsonlHistoryStore::new(&args.history);
    let entries = store.recent(args.limit)?;
    print!("{}", crate::report::format_history(&entries));
    Ok(())
}

pub fn train_config_from_args(args: &TrainArgs) -> TrainConfig {
    TrainConfig {
        data_path: args.data.clone(),
        artifact_dir: args.artifact_dir.clone(),
        schema_path: args.schema.clone(),
        seed: args.seed,
        ratios: SplitRatios {
            train: args.train_ratio,
            validation: args.val_ratio,
            test: args.test_ratio,
        },
        catalog: args.catalog,
        outlier_quantile: args.outlier_quantile,
        write_splits: !args.no_split_export,
    }
}

pub fn predict_config_from_args(args: &PredictArgs) -> PredictConfig {
    PredictConfig {
        artifact_dir: args.artifact_dir.clone(),
        record_json: args.record.clone(),
        input_csv: args.input.clone(),
        history_path: args.history.clone(),
        record_history: !args.no_history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn train_args_become_config() {
        let cli = Cli::try_parse_from([
            "lp",
            "train",
            "--data",
            "d.csv",
            "--artifact-dir",
            "out",
            "--seed",
            "7",
            "--no-split-export",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train");
        };
        let config = train_config_from_args(&args);
        assert_eq!(config.seed, 7);
        assert_eq!(config.artifact_dir, std::path::PathBuf::from("out"));
        assert!(!config.write_splits);
        assert!(config.ratios.validate().is_ok());
    }

    #[test]
    fn predict_args_become_config() {
        let cli = Cli::try_parse_from(["lp", "predict", "--record", "{}", "--no-history"]).unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        let config = predict_config_from_args(&args);
        assert_eq!(config.record_json.as_deref(), Some("{}"));
        assert!(!config.record_history);
    }
}
