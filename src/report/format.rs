//! Terminal output for training runs, predictions and history.
//!
//! We keep formatting code in one place so:
//! - the pipeline and model code stay free of presentation
//! - output changes are localized

use crate::app::pipeline::TrainingRun;
use crate::domain::TrainConfig;
use crate::fit::Selection;
use crate::io::HistoryEntry;

/// Format the full run summary (data, split, model table, chosen model, artifacts).
pub fn format_run_summary(run: &TrainingRun, config: &TrainConfig) -> String {
    let mut out = String::new();

    out.push_str("=== lp - listing price model training ===\n");
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    out.push_str(&format!(
        "Rows: read={} usable={} skipped={}\n",
        run.rows_read, run.rows_usable, run.rows_skipped
    ));
    out.push_str(&format!(
        "Split (seed {}): train={} validation={} test={}\n",
        config.seed, run.split_sizes[0], run.split_sizes[1], run.split_sizes[2]
    ));
    out.push_str(&format!(
        "Train after outlier cap: {} rows (log_price <= {:.4})\n",
        run.train_rows, run.target_cap
    ));

    out.push('\n');
    out.push_str(&format_selection(&run.selection));

    out.push_str("\nArtifacts:\n");
    out.push_str(&format!("- {}\n", run.artifact.preprocessor_path.display()));
    out.push_str(&format!("- {}\n", run.artifact.model_path.display()));
    out
}

/// Candidate table plus failures and the chosen model.
pub fn format_selection(selection: &Selection) -> String {
    let mut out = String::new();
    out.push_str("Model diagnostics (selection by 5-fold CV R² on train):\n");
    out.push_str(
        format!(
            "  {:<26} {:>8} {:>8} {:>8} {:>9}  {}\n",
            "model", "cv_r2", "val_r2", "test_r2", "test_rmse", "params"
        )
        .as_str(),
    );
    out.push_str(&format!(
        "  {:-<26} {:-<8} {:-<8} {:-<8} {:-<9}  {:-<6}\n",
        "", "", "", "", "", ""
    ));

    for o in &selection.outcomes {
        let chosen = if o.name == selection.best.name { "*" } else { " " };
        out.push_str(
            format!(
                "{chosen} {:<26} {:>8.4} {:>8} {:>8} {:>9}  {}\n",
                truncate(&o.name, 26),
                o.cv_score,
                fmt_opt(o.validation_r2),
                fmt_opt(o.test_r2),
                fmt_opt(o.test_rmse),
                o.params
            )
            .as_str(),
        );
    }
    for f in &selection.failures {
        out.push_str(&format!("  (failed {}) {}\n", f.name, f.reason));
    }

    out.push_str(&format!(
        "\nChosen model: {} (cv_r2={:.4}, params: {})\n",
        selection.best.name, selection.best.cv_score, selection.best.params
    ));
    out
}

pub fn format_prediction(log_price: f64) -> String {
    format!(
        "Predicted price: ${:.2} per night (log_price={:.4})",
        log_price.exp(),
        log_price
    )
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No predictions recorded yet.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:<14} {:<20} {:<16} {:>5} {:>10}\n",
        "timestamp", "city", "property_type", "room_type", "guests", "price"
    ));
    for e in entries {
        out.push_str(&format!(
            "{:<20} {:<14} {:<20} {:<16} {:>5} {:>10.2}\n",
            e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            truncate(e.city.as_deref().unwrap_or("-"), 14),
            truncate(e.property_type.as_deref().unwrap_or("-"), 20),
            truncate(e.room_type.as_deref().unwrap_or("-"), 16),
            e.accommodates.map_or("-".to_string(), |a| a.to_string()),
            e.price
        ));
    }
    out
}

fn fmt_opt(v: Option<f64>) -> String {
    v.filter(|x| x.is_finite())
        .map_or("n/a".to_string(), |x| format!("{x:.4}"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{CandidateFailure, CandidateOutcome, EvaluationReport};
    use crate::models::{FittedModel, Hyperparams, LinearModel, ModelKind};
    use chrono::{TimeZone, Utc};

    fn outcome(name: &str, cv: f64) -> CandidateOutcome {
        CandidateOutcome {
            name: name.to_string(),
            params: Hyperparams::defaults(ModelKind::Ridge),
            cv_score: cv,
            validation_r2: Some(0.5),
            test_r2: None,
            test_rmse: Some(0.25),
            model: FittedModel::Linear(LinearModel {
                coefficients: vec![],
                intercept: 0.0,
            }),
        }
    }

    #[test]
    fn selection_table_marks_best_and_failures() {
        let best = outcome("Ridge", 0.7);
        let mut report = EvaluationReport::new();
        report.insert("Lasso", 0.6);
        report.insert("Ridge", 0.7);
        let selection = Selection {
            best: best.clone(),
            report,
            outcomes: vec![outcome("Lasso", 0.6), best],
            failures: vec![CandidateFailure {
                name: "ElasticNet".into(),
                reason: "diverged".into(),
            }],
        };

        let text = format_selection(&selection);
        assert!(text.contains("* Ridge"));
        assert!(text.contains("  Lasso"));
        assert!(text.contains("(failed ElasticNet) diverged"));
        assert!(text.contains("n/a"));
        assert!(text.contains("Chosen model: Ridge"));
    }

    #[test]
    fn prediction_is_exponentiated() {
        let text = format_prediction(100.0_f64.ln());
        assert!(text.contains("$100.00"), "{text}");
    }

    #[test]
    fn history_table_lists_entries() {
        let entries = vec![HistoryEntry {
            city: Some("NYC".into()),
            property_type: None,
            room_type: Some("Entire home/apt".into()),
            accommodates: Some(4),
            price: 150.0,
            timestamp: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
        }];
        let text = format_history(&entries);
        assert!(text.contains("2024-02-03 04:05:06"));
        assert!(text.contains("150.00"));
        assert!(format_history(&[]).contains("No predictions"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("GradientBoostingRegressor", 10), "GradientB.");
        assert_eq!(truncate("Ridge", 10), "Ridge");
    }
}
