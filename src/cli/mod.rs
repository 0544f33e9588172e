//! Command-line parsing for the listing price trainer.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline. Arguments are converted into plain config structs in `app`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::CatalogKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lp", version, about = "Short-term rental listing price model trainer")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split, transform, search the model catalog and save the best model.
    Train(TrainArgs),
    /// Price listings with saved artifacts.
    Predict(PredictArgs),
    /// Show recent predictions.
    History(HistoryArgs),
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// Listing CSV with a `log_price` column.
    #[arg(short, long, env = "LP_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// Directory for preprocessor.json, model.json and split CSVs.
    #[arg(long, env = "LP_ARTIFACT_DIR", default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// Feature schema JSON; the built-in schema is used when omitted.
    #[arg(long, env = "LP_SCHEMA", value_name = "JSON")]
    pub schema: Option<PathBuf>,

    /// Seed for the split and the forest bootstrap.
    #[arg(long, env = "LP_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Fraction of rows used for training.
    #[arg(long, default_value_t = 0.6)]
    pub train_ratio: f64,

    /// Fraction of rows held out for validation.
    #[arg(long, default_value_t = 0.2)]
    pub val_ratio: f64,

    /// Fraction of rows held out for testing.
    #[arg(long, default_value_t = 0.2)]
    pub test_ratio: f64,

    /// Which model catalog to search.
    #[arg(long, value_enum, default_value_t = CatalogKind::Standard)]
    pub catalog: CatalogKind,

    /// Train rows with log_price above this quantile are dropped.
    #[arg(long, default_value_t = 0.99)]
    pub outlier_quantile: f64,

    /// Do not write raw/train/val/test CSVs to the artifact directory.
    #[arg(long)]
    pub no_split_export: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Directory holding preprocessor.json and model.json.
    #[arg(long, env = "LP_ARTIFACT_DIR", default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// One listing as a JSON object, e.g. '{"city": "NYC", "accommodates": 2}'.
    ///
    /// `amenities` is the comma-joined list ("TV,Wifi,Kitchen"), not a count;
    /// a bare number is read as a single amenity.
    #[arg(long, value_name = "JSON", conflicts_with = "input", required_unless_present = "input")]
    pub record: Option<String>,

    /// CSV of listings to price.
    #[arg(long, value_name = "CSV")]
    pub input: Option<PathBuf>,

    /// Prediction history file.
    #[arg(long, env = "LP_HISTORY", default_value = "history.jsonl")]
    pub history: PathBuf,

    /// Do not append predictions to the history file.
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    /// Prediction history file.
    #[arg(long, env = "LP_HISTORY", default_value = "history.jsonl")]
    pub history: PathBuf,

    /// Number of entries to show.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_train_with_defaults() {
        let cli = Cli::try_parse_from(["lp", "train", "--data", "listings.csv"]).unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.data, PathBuf::from("listings.csv"));
        assert_eq!(args.catalog, CatalogKind::Standard);
        assert_eq!(args.train_ratio, 0.6);
        assert!(!args.no_split_export);
    }

    #[test]
    fn verbosity_counts_and_is_global() {
        let cli = Cli::try_parse_from(["lp", "history", "-vv", "-n", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::History(args) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.limit, 3);
    }

    #[test]
    fn predict_requires_one_input() {
        assert!(Cli::try_parse_from(["lp", "predict"]).is_err());
        assert!(
            Cli::try_parse_from(["lp", "predict", "--record", "{}", "--input", "a.csv"]).is_err()
        );
        assert!(Cli::try_parse_from(["lp", "predict", "--input", "a.csv"]).is_ok());
    }

    #[test]
    fn record_help_describes_amenities_as_a_list() {
        use clap::CommandFactory;

        let cmd = Cli::command();
        let predict = cmd.find_subcommand("predict").unwrap();
        let record = predict.get_arguments().find(|a| a.get_id() == "record").unwrap();
        let help = record.get_long_help().unwrap().to_string();
        assert!(help.contains("comma-joined list"), "{help}");
    }

    #[test]
    fn catalog_is_a_value_enum() {
        let cli =
            Cli::try_parse_from(["lp", "train", "--data", "x.csv", "--catalog", "quick"]).unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.catalog, CatalogKind::Quick);
    }
}
