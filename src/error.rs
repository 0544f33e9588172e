use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every failure the pipeline can surface, grouped by the stage that raised it.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("ingestion failed: {0}")]
    Ingestion(String),

    #[error("transformation failed{}: {message}", column_suffix(.column))]
    Transformation {
        column: Option<String>,
        message: String,
    },

    #[error("training failed{}: {message}", candidate_suffix(.candidate))]
    Training {
        candidate: Option<String>,
        message: String,
    },

    #[error("persistence failed for '{}': {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("history store failed: {0}")]
    History(String),
}

impl AppError {
    pub fn transformation(message: impl Into<String>) -> Self {
        Self::Transformation {
            column: None,
            message: message.into(),
        }
    }

    pub fn column(column: &str, message: impl Into<String>) -> Self {
        Self::Transformation {
            column: Some(column.to_string()),
            message: message.into(),
        }
    }

    pub fn training(message: impl Into<String>) -> Self {
        Self::Training {
            candidate: None,
            message: message.into(),
        }
    }

    pub fn candidate(name: &str, message: impl Into<String>) -> Self {
        Self::Training {
            candidate: Some(name.to_string()),
            message: message.into(),
        }
    }

    pub fn persistence(path: &Path, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Ingestion(_) => 3,
            Self::Transformation { .. } => 4,
            Self::Training { .. } => 5,
            Self::Persistence { .. } => 6,
            Self::History(_) => 7,
        }
    }
}

fn column_suffix(column: &Option<String>) -> String {
    column
        .as_deref()
        .map(|c| format!(" (column `{c}`)"))
        .unwrap_or_default()
}

fn candidate_suffix(candidate: &Option<String>) -> String {
    candidate
        .as_deref()
        .map(|c| format!(" (candidate `{c}`)"))
        .unwrap_or_default()
}
