mod cache;
mod engine;
mod imports;
mod indexer;
mod parser;
mod validator;
mod walker;

// Cross-module call resolution
pub mod call_graph;

// Language-specific parsers
pub mod languages;

pub mod model;

pub use cache::ContentCache;
pub use engine::Engine;
pub use imports::{resolve_token, ImportNormalizer, ImportTable, ImportToken};
pub use indexer::{dotted_name, ModuleIndexer, RepoIndex};
pub use parser::{calculate_hash, CodeParser};
pub use validator::{ResultValidator, ValidationResult};
pub use walker::{PathFilter, SourceFile, SourceWalker, WalkOutcome};

pub use model::{
    AnalysisResult, AnalysisStats, CallEdge, DataField, DataShape, EnumDecl, ErrorType, Modifier,
    ModuleId, ModuleRecord, PatternFlag, PatternRule, Route, Symbol, SymbolId, SymbolKind,
    MODULE_ANCHOR_SID, NO_SYMBOL,
};
