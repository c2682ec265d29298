use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to parse {input:?} with any of the formats {formats:?}")]
    DateParse {
        input: String,
        formats: Vec<&'static str>,
    },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("failed to persist {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to load {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
