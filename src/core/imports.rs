// src/core/imports.rs
//! Import normalization: alias tables and import targets for one Python file.

use std::collections::{BTreeMap, BTreeSet};

use tree_sitter::Node;

use super::indexer::{dotted_name, RepoIndex};
use super::languages::syntax::node_text;
use super::model::file_stem;

const MAX_TREE_DEPTH: usize = 500;

/// A module named by an import statement, before it is matched to a file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportToken {
    /// Absolute dotted module name, e.g. `pkg.util`
    Dotted(String),
    /// Relative import expanded to a root-relative file path, e.g. `pkg/util.py`
    Path(String),
}

/// Everything the import statements of one file declare
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    /// Locally bound name -> fully-qualified origin
    pub aliases: BTreeMap<String, String>,
    pub tokens: BTreeSet<ImportToken>,
    /// Number of `from x import *` statements
    pub wildcards: usize,
}

/// Builds the import table of one file, relative to that file's package
pub struct ImportNormalizer {
    /// Directory segments of the importing file
    package_dirs: Vec<String>,
}

impl ImportNormalizer {
    pub fn new(module_path: &str) -> Self {
        let mut package_dirs: Vec<String> = module_path.split('/').map(str::to_string).collect();
        package_dirs.pop();
        Self { package_dirs }
    }

    /// Walk every import statement in the tree, nested ones included
    pub fn collect(&self, root: Node, source: &str) -> ImportTable {
        let mut table = ImportTable::default();
        self.visit(root, source, &mut table, 0);
        table
    }

    fn visit(&self, node: Node, source: &str, table: &mut ImportTable, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            return;
        }

        match node.kind() {
            "import_statement" => {
                self.plain_import(node, source, table);
                return;
            }
            "import_from_statement" => {
                self.from_import(node, source, table);
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, source, table, depth + 1);
        }
    }

    /// `import a.b` and `import a.b as c`
    fn plain_import(&self, node: Node, source: &str, table: &mut ImportTable) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (module, alias) = match name.kind() {
                "aliased_import" => {
                    let Some(module) = name.child_by_field_name("name") else {
                        continue;
                    };
                    let module = node_text(module, source).to_string();
                    let alias = name
                        .child_by_field_name("alias")
                        .map(|alias| node_text(alias, source).to_string())
                        .unwrap_or_else(|| module.clone());
                    (module, alias)
                }
                _ => {
                    let module = node_text(name, source).to_string();
                    (module.clone(), module)
                }
            };
            table.aliases.insert(alias, module.clone());
            table.tokens.insert(ImportToken::Dotted(module));
        }
    }

    /// `from m import n [as k]`, relative forms and wildcards
    fn from_import(&self, node: Node, source: &str, table: &mut ImportTable) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };

        let (base, token) = if module_node.kind() == "relative_import" {
            let (level, remainder) = split_relative(module_node, source);
            let dirs = self.ancestor_dirs(level);
            let mut base_parts = dirs.to_vec();
            base_parts.extend(remainder.iter().cloned());

            let path = if remainder.is_empty() {
                join_path(dirs, "__init__.py")
            } else {
                let mut parts = dirs.to_vec();
                parts.extend(remainder.iter().cloned());
                format!("{}.py", parts.join("/"))
            };
            (base_parts.join("."), ImportToken::Path(path))
        } else {
            let module = node_text(module_node, source).to_string();
            (module.clone(), ImportToken::Dotted(module))
        };
        table.tokens.insert(token);

        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|child| child.kind() == "wildcard_import")
        {
            table.wildcards += 1;
        }

        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let (imported, alias) = match name.kind() {
                "aliased_import" => {
                    let Some(imported) = name.child_by_field_name("name") else {
                        continue;
                    };
                    let imported = node_text(imported, source).to_string();
                    let alias = name
                        .child_by_field_name("alias")
                        .map(|alias| node_text(alias, source).to_string())
                        .unwrap_or_else(|| imported.clone());
                    (imported, alias)
                }
                _ => {
                    let imported = node_text(name, source).to_string();
                    (imported.clone(), imported)
                }
            };
            let origin = if base.is_empty() {
                imported
            } else {
                format!("{}.{}", base, imported)
            };
            table.aliases.insert(alias, origin);
        }
    }

    /// Package directory `level` dots refer to; one dot is the file's own package
    fn ancestor_dirs(&self, level: usize) -> &[String] {
        let up = level.saturating_sub(1).min(self.package_dirs.len());
        &self.package_dirs[..self.package_dirs.len() - up]
    }

    /// Module paths the tokens refer to; unresolvable tokens are dropped
    pub fn resolve(tokens: &BTreeSet<ImportToken>, index: &RepoIndex) -> BTreeSet<String> {
        tokens
            .iter()
            .flat_map(|token| resolve_token(token, index))
            .collect()
    }
}

/// Match one token against the module index.
///
/// Path tokens match an indexed file directly, or by the dotted name the path
/// maps to. Dotted tokens match exactly, else every module whose file stem is
/// the token's last segment.
pub fn resolve_token(token: &ImportToken, index: &RepoIndex) -> Vec<String> {
    match token {
        ImportToken::Path(path) => {
            if index.paths_for_stem(file_stem(path)).iter().any(|p| p == path) {
                return vec![path.clone()];
            }
            index
                .path_for_dotted(&dotted_name(path))
                .map(|p| vec![p.to_string()])
                .unwrap_or_default()
        }
        ImportToken::Dotted(dotted) => {
            if let Some(path) = index.path_for_dotted(dotted) {
                return vec![path.to_string()];
            }
            let last = dotted.rsplit('.').next().unwrap_or(dotted);
            index.paths_for_stem(last).to_vec()
        }
    }
}

/// Number of leading dots and the dotted remainder of a relative import
fn split_relative(node: Node, source: &str) -> (usize, Vec<String>) {
    let mut level = 0;
    let mut remainder = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_prefix" => level = node_text(child, source).matches('.').count(),
            "dotted_name" => {
                remainder = node_text(child, source)
                    .split('.')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
    (level, remainder)
}

fn join_path(dirs: &[String], file: &str) -> String {
    if dirs.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dirs.join("/"), file)
    }
}
