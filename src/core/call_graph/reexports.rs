// src/core/call_graph/reexports.rs
use std::collections::{BTreeMap, HashMap};

use crate::core::model::ModuleRecord;

/// Upper bound on re-export hops followed for one name
pub const MAX_REEXPORT_HOPS: usize = 8;

/// Records what a package-init module republishes under its own namespace
pub struct ReexportTracker;

impl ReexportTracker {
    /// Fill `module.reexports` from its alias table and `__all__` names.
    ///
    /// Only package-init modules re-export; other modules are left untouched.
    pub fn track(module: &mut ModuleRecord, exported: Option<&[String]>) {
        if !module.is_package_init() {
            return;
        }

        let package = module.dotted.clone();
        let mut reexports: BTreeMap<String, String> = module
            .import_aliases
            .iter()
            .map(|(local, origin)| (qualify(&package, local), origin.clone()))
            .collect();

        for name in exported.unwrap_or_default() {
            let origin = module.import_aliases.get(name).cloned().or_else(|| {
                module
                    .top_level_definitions()
                    .any(|defined| defined == name)
                    .then(|| qualify(&package, name))
            });
            if let Some(origin) = origin {
                reexports.insert(qualify(&package, name), origin);
            }
        }

        module.reexports = reexports;
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

/// Every module's re-exports merged into one read-only table
#[derive(Debug, Clone, Default)]
pub struct ReexportMap {
    entries: HashMap<String, String>,
}

impl ReexportMap {
    /// Merge in path order; a later module wins a duplicate key
    pub fn build(modules: &BTreeMap<String, ModuleRecord>) -> Self {
        let entries = modules
            .values()
            .flat_map(|module| module.reexports.iter())
            .map(|(exported, origin)| (exported.clone(), origin.clone()))
            .collect();
        Self { entries }
    }

    /// Origin of an exact exported name
    pub fn origin(&self, exported: &str) -> Option<&str> {
        self.entries
            .get(exported)
            .map(String::as_str)
            // an alias of itself is not an indirection
            .filter(|origin| *origin != exported)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
