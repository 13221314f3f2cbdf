// src/core/model.rs
//! Records produced by the two analysis passes.
//!
//! A [`ModuleRecord`] is created with identity fields only while the tree is
//! walked, filled in place by the scanning pass, receives its call edges in the
//! resolution pass and is read-only afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

pub type ModuleId = u32;
pub type SymbolId = u32;

/// Symbol id of the synthetic module anchor every record starts with
pub const MODULE_ANCHOR_SID: SymbolId = 1;

/// Target symbol id meaning "this module, no specific symbol"
pub const NO_SYMBOL: SymbolId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    Property,
}

impl SymbolKind {
    pub fn tag(&self) -> &'static str {
        match self {
            SymbolKind::Module => "mod",
            SymbolKind::Class => "cls",
            SymbolKind::Function => "fn",
            SymbolKind::Property => "prop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Static,
    Classmethod,
    Property,
    Descriptor,
}

/// One indexed definition, or a file's synthetic self-reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Owning module id
    pub module_id: ModuleId,
    /// Id unique within the owning module
    pub id: SymbolId,
    pub kind: SymbolKind,
    /// Bare name, or `Owner.member` for class members
    pub name: String,
    /// `(a:int,b)->Any` style signature for functions and methods
    pub signature: Option<String>,
    /// Decorator names as written, call arguments dropped
    pub decorators: Vec<String>,
    pub modifiers: BTreeSet<Modifier>,
    /// `requires(..)`, `ensures(..)` or both, from the doc comment
    pub invariants: Option<String>,
    /// Exception names raised directly in the body, first occurrence order
    pub raises: Vec<String>,
    /// 1-based inclusive line range in the source file
    pub line_range: (usize, usize),
}

impl Symbol {
    pub fn new(module_id: ModuleId, id: SymbolId, kind: SymbolKind, name: impl Into<String>) -> Self {
        Self {
            module_id,
            id,
            kind,
            name: name.into(),
            signature: None,
            decorators: Vec::new(),
            modifiers: BTreeSet::new(),
            invariants: None,
            raises: Vec::new(),
            line_range: (0, 0),
        }
    }

    pub fn is_property(&self) -> bool {
        self.kind == SymbolKind::Property
    }
}

/// Directed reference from a caller symbol to a resolved callee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: SymbolId,
    pub target_module: ModuleId,
    /// [`NO_SYMBOL`] when only the module could be resolved
    pub target_symbol: SymbolId,
}

impl CallEdge {
    pub fn is_module_anchor(&self) -> bool {
        self.target_symbol == NO_SYMBOL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    pub type_name: String,
}

/// A dataclass / model-style declaration and its annotated fields, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShape {
    pub name: String,
    pub fields: Vec<DataField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorType {
    pub name: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Symbol id of the decorated handler
    pub symbol: SymbolId,
    pub verb: String,
    pub path: String,
    pub status_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<String>,
}

/// Lint-style rules raised while scanning a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternRule {
    BareExcept,
    EvalExec,
    PrintInProduction,
    WildcardImport,
    MutableDefault,
    GlobalStateInService,
}

impl PatternRule {
    pub fn rule(&self) -> &'static str {
        match self {
            PatternRule::BareExcept => "forbid bare except",
            PatternRule::EvalExec => "forbid eval/exec",
            PatternRule::PrintInProduction => "forbid print in production",
            PatternRule::WildcardImport => "forbid wildcard import",
            PatternRule::MutableDefault => "forbid mutable default arguments",
            PatternRule::GlobalStateInService => "forbid global state in svc",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            PatternRule::BareExcept => "error-handling",
            PatternRule::EvalExec => "security",
            PatternRule::PrintInProduction => "logging",
            PatternRule::WildcardImport => "namespace",
            PatternRule::MutableDefault => "bug-risk",
            PatternRule::GlobalStateInService => "concurrency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFlag {
    pub rule: String,
    pub category: String,
}

impl From<PatternRule> for PatternFlag {
    fn from(rule: PatternRule) -> Self {
        Self {
            rule: rule.rule().to_string(),
            category: rule.category().to_string(),
        }
    }
}

/// One analyzed source file and everything derived from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: ModuleId,
    /// Posix-style path relative to the analysis root
    pub path: String,
    /// Canonical dotted module name
    pub dotted: String,
    /// Short language tag derived from the extension
    pub language: String,
    pub role_tags: BTreeSet<String>,
    /// SHA-256 of the source, set once the file has been read
    pub content_hash: Option<String>,
    /// Whether the syntax tree was extracted (false for unparsed or foreign files)
    pub parsed: bool,
    pub symbols: Vec<Symbol>,
    /// Paths of modules this file imports
    pub import_paths: BTreeSet<String>,
    /// Locally bound import name -> fully-qualified origin
    pub import_aliases: BTreeMap<String, String>,
    /// Function or `Class.method` name -> symbol id
    pub functions: BTreeMap<String, SymbolId>,
    /// `Class.property` name -> symbol id
    pub properties: BTreeMap<String, SymbolId>,
    /// Exported dotted name -> origin dotted name (package-init files only)
    pub reexports: BTreeMap<String, String>,
    pub calls: Vec<CallEdge>,
    pub data_shapes: Vec<DataShape>,
    pub errors: Vec<ErrorType>,
    pub routes: Vec<Route>,
    pub enums: Vec<EnumDecl>,
    pub pattern_flags: Vec<PatternFlag>,
}

impl ModuleRecord {
    /// Skeletal record holding only identity fields and the module anchor
    pub fn new(
        id: ModuleId,
        path: impl Into<String>,
        dotted: impl Into<String>,
        language: impl Into<String>,
        role_tags: BTreeSet<String>,
    ) -> Self {
        let path = path.into();
        let stem = file_stem(&path).to_string();

        Self {
            id,
            path,
            dotted: dotted.into(),
            language: language.into(),
            role_tags,
            content_hash: None,
            parsed: false,
            symbols: vec![Symbol::new(id, MODULE_ANCHOR_SID, SymbolKind::Module, stem)],
            import_paths: BTreeSet::new(),
            import_aliases: BTreeMap::new(),
            functions: BTreeMap::new(),
            properties: BTreeMap::new(),
            reexports: BTreeMap::new(),
            calls: Vec::new(),
            data_shapes: Vec::new(),
            errors: Vec::new(),
            routes: Vec::new(),
            enums: Vec::new(),
            pattern_flags: Vec::new(),
        }
    }

    pub fn is_package_init(&self) -> bool {
        file_name(&self.path) == "__init__.py"
    }

    /// Id the next appended symbol will receive
    pub fn next_symbol_id(&self) -> SymbolId {
        self.symbols.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.id == id)
    }

    /// Look a name up in the function table first, then the property table
    pub fn lookup_callable(&self, name: &str) -> Option<SymbolId> {
        self.functions
            .get(name)
            .or_else(|| self.properties.get(name))
            .copied()
    }

    /// Names of top-level classes and functions
    pub fn top_level_definitions(&self) -> impl Iterator<Item = &str> {
        self.symbols
            .iter()
            .filter(|s| matches!(s.kind, SymbolKind::Class | SymbolKind::Function))
            .filter(|s| !s.name.contains('.'))
            .map(|s| s.name.as_str())
    }

    pub fn flag(&mut self, rule: PatternRule) {
        self.pattern_flags.push(rule.into());
    }
}

/// Aggregate handed to rendering and export collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Relative path -> module record, iterated in path order
    pub modules: BTreeMap<String, ModuleRecord>,
    /// Sorted short language tags found under the root
    pub languages: Vec<String>,
}

impl AnalysisResult {
    pub fn module_by_id(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.modules.values().find(|m| m.id == id)
    }

    /// Id -> record lookup table for repeated access
    pub fn id_table(&self) -> HashMap<ModuleId, &ModuleRecord> {
        self.modules.values().map(|m| (m.id, m)).collect()
    }

    pub fn total_calls(&self) -> usize {
        self.modules.values().map(|m| m.calls.len()).sum()
    }

    pub fn stats(&self) -> AnalysisStats {
        let modules = self.modules.values();
        let mut stats = AnalysisStats {
            modules: self.modules.len(),
            languages: self.languages.len(),
            ..Default::default()
        };

        for module in modules {
            stats.symbols += module.symbols.len();
            stats.calls += module.calls.len();
            stats.imports += module.import_paths.len();
            stats.data_shapes += module.data_shapes.len();
            stats.errors += module.errors.len();
            stats.routes += module.routes.len();
            stats.pattern_flags += module.pattern_flags.len();
            if !module.parsed && module.language == "py" {
                stats.unparsed += 1;
            }
        }

        stats
    }
}

/// Aggregate counts over one analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub modules: usize,
    pub symbols: usize,
    pub calls: usize,
    pub imports: usize,
    pub data_shapes: usize,
    pub errors: usize,
    pub routes: usize,
    pub pattern_flags: usize,
    pub languages: usize,
    pub unparsed: usize,
}

impl fmt::Display for AnalysisStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} modules, {} symbols, {} calls, {} imports, {} data shapes, {} errors, {} routes, {} pattern flags",
            self.modules,
            self.symbols,
            self.calls,
            self.imports,
            self.data_shapes,
            self.errors,
            self.routes,
            self.pattern_flags
        )
    }
}

/// Last path segment of a posix path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its final extension
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}
