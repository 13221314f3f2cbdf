//! Two-pass static analyzer for Python codebases.
//!
//! The scanning pass walks a source tree, indexes every recognized file as a
//! module and extracts its symbols, imports and lightweight facts. The
//! resolution pass maps call expressions to `(module, symbol)` targets across
//! modules. The resulting [`AnalysisResult`] feeds rendering and export.

pub mod config;
pub mod core;
pub mod error;

use std::path::Path;

pub use crate::config::Config;
pub use crate::core::{AnalysisResult, Engine};
pub use crate::error::{CodecardError, Result, ValidationError};

/// Scanning pass with the default configuration
pub fn analyze(
    root: &Path,
    include: Option<&str>,
    exclude: Option<&str>,
) -> Result<AnalysisResult> {
    Engine::default().analyze(root, include, exclude)
}

/// Resolution pass with the default configuration, filling `result` in place
pub fn resolve_calls(root: &Path, result: &mut AnalysisResult) -> Result<()> {
    Engine::default().resolve_calls(root, result)
}
