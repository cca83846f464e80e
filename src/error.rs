use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynoptError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resource Exhausted: all {capacity} worker slots are taken")]
    ResourceExhausted { capacity: usize },

    #[error("Engine Invocation Failure: no critical points after {attempts} attempts")]
    EngineInvocation { attempts: usize },

    #[error("Data Integrity Error: {0}")]
    DataIntegrity(String),

    #[error("Computation Error: {0}")]
    Computation(String),

    #[error("Missing Persisted State: {}", .0.display())]
    PersistenceMissing(PathBuf),

    #[error("Parse Error in {}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

pub type SynResult<T> = Result<T, SynoptError>;
