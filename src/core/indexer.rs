// src/core/indexer.rs
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::HeuristicsConfig;
use super::model::{file_stem, ModuleId, ModuleRecord};
use super::walker::SourceFile;

/// Assigns module ids, dotted names and role tags to walked files
pub struct ModuleIndexer {
    heuristics: HeuristicsConfig,
}

impl ModuleIndexer {
    pub fn new(heuristics: &HeuristicsConfig) -> Self {
        Self {
            heuristics: heuristics.clone(),
        }
    }

    /// Build skeletal records; `files` must already be sorted by path
    pub fn index(&self, files: &[SourceFile]) -> BTreeMap<String, ModuleRecord> {
        files
            .iter()
            .zip(1..)
            .map(|(file, id): (&SourceFile, ModuleId)| {
                let record = ModuleRecord::new(
                    id,
                    file.rel_path.clone(),
                    dotted_name(&file.rel_path),
                    file.language.clone(),
                    self.role_tags(&file.rel_path),
                );
                (file.rel_path.clone(), record)
            })
            .collect()
    }

    /// Union of tags whose keyword occurs in the path, or the default tag
    pub fn role_tags(&self, rel_path: &str) -> BTreeSet<String> {
        let lower = rel_path.to_lowercase();
        let tags: BTreeSet<String> = self
            .heuristics
            .role_keywords
            .iter()
            .filter(|row| lower.contains(&row.keyword.to_lowercase()))
            .map(|row| row.tag.clone())
            .collect();

        if tags.is_empty() {
            BTreeSet::from([self.heuristics.default_role.clone()])
        } else {
            tags
        }
    }
}

/// Dotted module name for a relative path.
///
/// `pkg/sub/__init__.py` becomes `pkg.sub`; any other file drops its extension.
pub fn dotted_name(rel_path: &str) -> String {
    let (dir, name) = match rel_path.rfind('/') {
        Some(slash) => (&rel_path[..slash], &rel_path[slash + 1..]),
        None => ("", rel_path),
    };

    if name == "__init__.py" {
        return dir.replace('/', ".");
    }

    let stem = file_stem(name);
    if dir.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", dir.replace('/', "."), stem)
    }
}

/// Lookup tables over the whole module set, rebuilt whenever it changes
#[derive(Debug, Clone, Default)]
pub struct RepoIndex {
    dotted_to_path: HashMap<String, String>,
    stem_to_paths: HashMap<String, Vec<String>>,
}

impl RepoIndex {
    pub fn build(modules: &BTreeMap<String, ModuleRecord>) -> Self {
        let mut index = Self::default();

        // path order keeps stem candidates in first-indexed order
        for (path, record) in modules {
            if !record.dotted.is_empty() {
                let is_python = record.language == "py";
                match index.dotted_to_path.get(&record.dotted) {
                    // python modules win name clashes with same-named foreign files
                    Some(existing) if !is_python || existing.ends_with(".py") => {}
                    _ => {
                        index
                            .dotted_to_path
                            .insert(record.dotted.clone(), path.clone());
                    }
                }
            }
            index
                .stem_to_paths
                .entry(file_stem(path).to_string())
                .or_default()
                .push(path.clone());
        }

        index
    }

    pub fn path_for_dotted(&self, dotted: &str) -> Option<&str> {
        self.dotted_to_path.get(dotted).map(String::as_str)
    }

    pub fn paths_for_stem(&self, stem: &str) -> &[String] {
        self.stem_to_paths
            .get(stem)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Longest leading run of `dotted`'s segments naming a known module.
    ///
    /// Returns the module path and how many segments the module name used.
    pub fn longest_prefix_module(&self, dotted: &str) -> Option<(&str, usize)> {
        let parts: Vec<&str> = dotted.split('.').collect();
        (1..=parts.len()).rev().find_map(|len| {
            let candidate = parts[..len].join(".");
            self.path_for_dotted(&candidate).map(|path| (path, len))
        })
    }

    pub fn len(&self) -> usize {
        self.dotted_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dotted_to_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source(path: &str) -> SourceFile {
        let language = if path.ends_with(".py") { "py" } else { "ts" };
        SourceFile {
            rel_path: path.to_string(),
            abs_path: PathBuf::from(path),
            language: language.to_string(),
        }
    }

    fn indexer() -> ModuleIndexer {
        ModuleIndexer::new(&HeuristicsConfig::default())
    }

    #[test]
    fn test_dotted_names() {
        assert_eq!(dotted_name("pkg/__init__.py"), "pkg");
        assert_eq!(dotted_name("pkg/sub/util.py"), "pkg.sub.util");
        assert_eq!(dotted_name("main.py"), "main");
        assert_eq!(dotted_name("__init__.py"), "");
        assert_eq!(dotted_name("web/app.ts"), "web.app");
    }

    #[test]
    fn test_role_tags_are_unioned_case_insensitively() {
        let tags = indexer().role_tags("src/Auth/UserRepository.py");
        assert_eq!(
            tags,
            BTreeSet::from(["auth".to_string(), "repo".to_string()])
        );

        let tags = indexer().role_tags("services/billing_svc.py");
        assert_eq!(tags, BTreeSet::from(["svc".to_string()]));
    }

    #[test]
    fn test_role_tags_default() {
        let tags = indexer().role_tags("lib/math.py");
        assert_eq!(tags, BTreeSet::from(["mod".to_string()]));
    }

    #[test]
    fn test_ids_follow_sorted_order() {
        let files = vec![source("a.py"), source("b/c.py"), source("b/d.py")];
        let modules = indexer().index(&files);

        let ids: Vec<(&str, u32)> = modules
            .iter()
            .map(|(path, m)| (path.as_str(), m.id))
            .collect();
        assert_eq!(ids, vec![("a.py", 1), ("b/c.py", 2), ("b/d.py", 3)]);
    }

    #[test]
    fn test_longest_prefix_module() {
        let files = vec![
            source("pkg/__init__.py"),
            source("pkg/util.py"),
            source("other/util.py"),
        ];
        let modules = indexer().index(&files);
        let index = RepoIndex::build(&modules);

        assert_eq!(
            index.longest_prefix_module("pkg.util.Helper.run"),
            Some(("pkg/util.py", 2))
        );
        assert_eq!(
            index.longest_prefix_module("pkg.missing"),
            Some(("pkg/__init__.py", 1))
        );
        assert_eq!(index.longest_prefix_module("nothing.here"), None);
        assert_eq!(
            index.paths_for_stem("util"),
            &["other/util.py".to_string(), "pkg/util.py".to_string()]
        );
    }

    #[test]
    fn test_python_module_wins_dotted_clash() {
        let files = vec![source("app.py"), source("app.ts")];
        let modules = indexer().index(&files);
        let index = RepoIndex::build(&modules);

        assert_eq!(index.path_for_dotted("app"), Some("app.py"));
    }
}
