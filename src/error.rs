use std::path::PathBuf;

use thiserror::Error;

/// Main error type for codecard operations
#[derive(Error, Debug)]
pub enum CodecardError {
    #[error("Root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Root path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Analysis result is inconsistent: {0}")]
    Validation(#[from] ValidationError),

    #[error("Analysis did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Analysis task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Internal-consistency failures found in a finished analysis.
///
/// These point at index corruption inside the pipeline, never at bad input,
/// so a result that fails validation must not be rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("module id {id} is not positive ({path})")]
    NonPositiveModuleId { id: u32, path: String },

    #[error("module id {id} is used by both {first} and {second}")]
    DuplicateModuleId { id: u32, first: String, second: String },

    #[error("symbol id {symbol} appears more than once in {path}")]
    DuplicateSymbolId { path: String, symbol: u32 },

    #[error("symbol {symbol} in {path} claims module {claimed}")]
    ForeignSymbol { path: String, symbol: u32, claimed: u32 },

    #[error("edge from {path} targets unknown module {module}")]
    UnknownTargetModule { path: String, module: u32 },

    #[error("edge from {path} targets unknown symbol {symbol} in module {module}")]
    UnknownTargetSymbol { path: String, module: u32, symbol: u32 },

    #[error("edge in {path} has unknown caller symbol {caller}")]
    UnknownCaller { path: String, caller: u32 },

    #[error("edge from {path} targets property symbol {symbol} in module {module}")]
    PropertyTarget { path: String, module: u32, symbol: u32 },
}

pub type Result<T> = std::result::Result<T, CodecardError>;
