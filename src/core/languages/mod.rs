//! Language-specific parsers.
//!
//! Each language gets its own module behind a common interface that fills a
//! [`ModuleRecord`] during the scanning pass and lists call sites during the
//! resolution pass. Parsers hold a tree-sitter parser and are not shared
//! between threads; every worker builds its own.

mod python;
pub mod syntax;

pub use python::PythonParser;

use std::collections::HashMap;

use crate::config::HeuristicsConfig;
use crate::error::Result;
use super::call_graph::CallSite;
use super::indexer::RepoIndex;
use super::model::ModuleRecord;

/// Read-only state every extraction needs
pub struct ExtractContext<'a> {
    pub heuristics: &'a HeuristicsConfig,
    /// Index over the whole module set, used to resolve import targets
    pub index: &'a RepoIndex,
}

/// Trait that all language parsers must implement
pub trait LanguageParser: Send {
    /// Fill `module` from `source`.
    ///
    /// Returns `Ok(false)` when the source does not parse; `module` is then
    /// left untouched apart from its anchor.
    fn extract(
        &mut self,
        source: &str,
        module: &mut ModuleRecord,
        context: &ExtractContext<'_>,
    ) -> Result<bool>;

    /// Call sites of `source` with their enclosing callers, `None` when it does not parse
    fn call_sites(&mut self, source: &str) -> Result<Option<Vec<CallSite>>>;

    /// Get the file extensions this parser handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}

/// Fresh parser for a language tag, `None` for languages that are only indexed
pub fn parser_for(language: &str) -> Result<Option<Box<dyn LanguageParser>>> {
    match language {
        "py" => Ok(Some(Box::new(PythonParser::new()?))),
        _ => Ok(None),
    }
}

/// Lazily built parsers owned by one worker
#[derive(Default)]
pub struct ParserSet {
    parsers: HashMap<String, Option<Box<dyn LanguageParser>>>,
}

impl ParserSet {
    /// Parser for a language tag, built on first use
    pub fn get(&mut self, language: &str) -> Result<Option<&mut Box<dyn LanguageParser>>> {
        if !self.parsers.contains_key(language) {
            let parser = parser_for(language)?;
            self.parsers.insert(language.to_string(), parser);
        }
        Ok(self.parsers.get_mut(language).and_then(Option::as_mut))
    }
}
