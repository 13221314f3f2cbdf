// src/core/call_graph/resolver.rs
use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::call_sites::{CallSite, Callee};
use super::reexports::{ReexportMap, MAX_REEXPORT_HOPS};
use crate::core::indexer::RepoIndex;
use crate::core::model::{CallEdge, ModuleId, ModuleRecord, SymbolId, NO_SYMBOL};

/// A resolved callee, before property suppression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub module: ModuleId,
    pub symbol: SymbolId,
}

impl Target {
    fn is_anchor(&self) -> bool {
        self.symbol == NO_SYMBOL
    }
}

/// Maps call sites to edges against the finished scanning-pass tables.
///
/// Built once after the barrier and shared read-only by every worker.
pub struct CallResolver<'a> {
    modules: &'a BTreeMap<String, ModuleRecord>,
    by_id: HashMap<ModuleId, &'a ModuleRecord>,
    index: RepoIndex,
    reexports: ReexportMap,
}

impl<'a> CallResolver<'a> {
    pub fn new(modules: &'a BTreeMap<String, ModuleRecord>) -> Self {
        Self {
            modules,
            by_id: modules.values().map(|m| (m.id, m)).collect(),
            index: RepoIndex::build(modules),
            reexports: ReexportMap::build(modules),
        }
    }

    /// Edges for every attributable, resolvable site, in site order
    pub fn resolve_module(&self, module: &ModuleRecord, sites: &[CallSite]) -> Vec<CallEdge> {
        sites
            .iter()
            .filter_map(|site| self.resolve_site(module, site))
            .collect()
    }

    pub fn resolve_site(&self, module: &ModuleRecord, site: &CallSite) -> Option<CallEdge> {
        let caller = site
            .caller
            .as_deref()
            .and_then(|key| module.functions.get(key))
            .copied()?;

        let target = match &site.callee {
            Callee::Local(name) => module.functions.get(name).map(|&symbol| Target {
                module: module.id,
                symbol,
            })?,
            Callee::Qualified(segments) => self.resolve_qualified(module, segments)?,
        };

        if self.is_property(target) {
            trace!(
                "Dropping property access from {} at line {}",
                module.path,
                site.line
            );
            return None;
        }

        Some(CallEdge {
            caller,
            target_module: target.module,
            target_symbol: target.symbol,
        })
    }

    /// Substitute the alias head, then resolve the full dotted path
    pub fn resolve_qualified(&self, module: &ModuleRecord, segments: &[String]) -> Option<Target> {
        let (head, rest) = segments.split_first()?;
        let dotted = match module.import_aliases.get(head) {
            Some(origin) => std::iter::once(origin.as_str())
                .chain(rest.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("."),
            None => segments.join("."),
        };
        self.resolve_dotted(&dotted, 0)
    }

    /// Direct resolution, falling back to re-exports when it finds no module
    /// or only a package's anchor
    pub fn resolve_dotted(&self, dotted: &str, hops: usize) -> Option<Target> {
        let direct = self.try_direct(dotted);

        let needs_reexport = match direct {
            None => true,
            Some(target) => target.is_anchor() && self.is_package_init(target.module),
        };
        if !needs_reexport || hops >= MAX_REEXPORT_HOPS {
            return direct;
        }

        let via_reexport = self
            .reexports
            .origin(dotted)
            .and_then(|origin| self.resolve_dotted(origin, hops + 1));

        match (direct, via_reexport) {
            (None, found) => found,
            (Some(_), Some(found)) if !found.is_anchor() => Some(found),
            (Some(anchor), _) => Some(anchor),
        }
    }

    /// Longest-prefix module match plus `Class.member` / bare-name lookup
    pub fn try_direct(&self, dotted: &str) -> Option<Target> {
        let (path, used) = self.index.longest_prefix_module(dotted)?;
        let target_module = self.modules.get(path)?;

        let rest: Vec<&str> = dotted.split('.').skip(used).collect();
        let symbol = match rest.as_slice() {
            [first, second, ..] => target_module
                .lookup_callable(&format!("{}.{}", first, second))
                .or_else(|| target_module.lookup_callable(first)),
            [first] => target_module.lookup_callable(first),
            [] => None,
        };

        Some(Target {
            module: target_module.id,
            symbol: symbol.unwrap_or(NO_SYMBOL),
        })
    }

    fn is_package_init(&self, module: ModuleId) -> bool {
        self.by_id.get(&module).map_or(false, |m| m.is_package_init())
    }

    fn is_property(&self, target: Target) -> bool {
        if target.is_anchor() {
            return false;
        }
        self.by_id
            .get(&target.module)
            .and_then(|m| m.symbol(target.symbol))
            .map_or(false, |symbol| symbol.is_property())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Symbol, SymbolKind};
    use std::collections::BTreeSet;

    fn module(id: ModuleId, path: &str, dotted: &str) -> ModuleRecord {
        ModuleRecord::new(id, path, dotted, "py", BTreeSet::from(["mod".to_string()]))
    }

    fn add_function(module: &mut ModuleRecord, name: &str) -> SymbolId {
        let id = module.next_symbol_id();
        module
            .symbols
            .push(Symbol::new(module.id, id, SymbolKind::Function, name));
        module.functions.insert(name.to_string(), id);
        id
    }

    fn add_property(module: &mut ModuleRecord, name: &str) -> SymbolId {
        let id = module.next_symbol_id();
        module
            .symbols
            .push(Symbol::new(module.id, id, SymbolKind::Property, name));
        module.properties.insert(name.to_string(), id);
        id
    }

    fn site(caller: &str, callee: &str) -> CallSite {
        let segments: Vec<String> = callee.split('.').map(str::to_string).collect();
        let callee = if segments.len() == 1 {
            Callee::Local(callee.to_string())
        } else {
            Callee::Qualified(segments)
        };
        CallSite {
            caller: Some(caller.to_string()),
            callee,
            line: 1,
        }
    }

    fn collect(modules: Vec<ModuleRecord>) -> BTreeMap<String, ModuleRecord> {
        modules.into_iter().map(|m| (m.path.clone(), m)).collect()
    }

    #[test]
    fn test_local_call() {
        let mut a = module(1, "a.py", "a");
        let f = add_function(&mut a, "f");
        let g = add_function(&mut a, "g");
        let modules = collect(vec![a]);
        let resolver = CallResolver::new(&modules);

        let a = &modules["a.py"];
        let edges = resolver.resolve_module(a, &[site("f", "g"), site("f", "missing")]);

        assert_eq!(
            edges,
            vec![CallEdge {
                caller: f,
                target_module: 1,
                target_symbol: g
            }]
        );
    }

    #[test]
    fn test_class_method_key_before_bare_name() {
        let mut lib = module(1, "lib.py", "lib");
        add_function(&mut lib, "Client");
        let method = add_function(&mut lib, "Client.send");
        let modules = collect(vec![lib]);
        let resolver = CallResolver::new(&modules);

        assert_eq!(
            resolver.try_direct("lib.Client.send"),
            Some(Target { module: 1, symbol: method })
        );
    }

    #[test]
    fn test_module_anchor_fallback() {
        let modules = collect(vec![module(1, "lib.py", "lib")]);
        let resolver = CallResolver::new(&modules);

        assert_eq!(
            resolver.resolve_dotted("lib.unknown", 0),
            Some(Target { module: 1, symbol: NO_SYMBOL })
        );
        assert_eq!(resolver.resolve_dotted("elsewhere.unknown", 0), None);
    }

    #[test]
    fn test_alias_head_is_substituted() {
        let mut util = module(2, "pkg/util.py", "pkg.util");
        let helper = add_function(&mut util, "helper");
        let mut main = module(1, "main.py", "main");
        let run = add_function(&mut main, "run");
        main.import_aliases
            .insert("u".to_string(), "pkg.util".to_string());
        let modules = collect(vec![main, util]);
        let resolver = CallResolver::new(&modules);

        let edge = resolver
            .resolve_site(&modules["main.py"], &site("run", "u.helper"))
            .unwrap();
        assert_eq!(edge.caller, run);
        assert_eq!((edge.target_module, edge.target_symbol), (2, helper));
    }

    #[test]
    fn test_reexport_beats_package_anchor() {
        let mut init = module(1, "pkg/__init__.py", "pkg");
        init.reexports
            .insert("pkg.helper".to_string(), "pkg.util.helper".to_string());
        let mut util = module(2, "pkg/util.py", "pkg.util");
        let helper = add_function(&mut util, "helper");
        let modules = collect(vec![init, util]);
        let resolver = CallResolver::new(&modules);

        assert_eq!(
            resolver.resolve_dotted("pkg.helper", 0),
            Some(Target { module: 2, symbol: helper })
        );
    }

    #[test]
    fn test_reexport_chains_are_followed() {
        let mut outer = module(1, "outer/__init__.py", "outer");
        outer
            .reexports
            .insert("outer.run".to_string(), "inner.run".to_string());
        let mut inner = module(2, "inner/__init__.py", "inner");
        inner
            .reexports
            .insert("inner.run".to_string(), "inner.impl.run".to_string());
        let mut implementation = module(3, "inner/impl.py", "inner.impl");
        let run = add_function(&mut implementation, "run");
        let modules = collect(vec![outer, inner, implementation]);
        let resolver = CallResolver::new(&modules);

        assert_eq!(
            resolver.resolve_dotted("outer.run", 0),
            Some(Target { module: 3, symbol: run })
        );
    }

    #[test]
    fn test_reexport_cycles_terminate() {
        let mut a = module(1, "a/__init__.py", "a");
        a.reexports.insert("a.x".to_string(), "b.x".to_string());
        let mut b = module(2, "b/__init__.py", "b");
        b.reexports.insert("b.x".to_string(), "a.x".to_string());
        let modules = collect(vec![a, b]);
        let resolver = CallResolver::new(&modules);

        assert_eq!(
            resolver.resolve_dotted("a.x", 0),
            Some(Target { module: 1, symbol: NO_SYMBOL })
        );
    }

    #[test]
    fn test_property_targets_are_suppressed() {
        let mut service = module(1, "service.py", "service");
        let use_sid = add_function(&mut service, "Service.use");
        add_property(&mut service, "Service.config");
        let modules = collect(vec![service]);
        let resolver = CallResolver::new(&modules);
        let service = &modules["service.py"];

        assert!(resolver
            .resolve_site(service, &site("Service.use", "service.Service.config"))
            .is_none());
        let edge = resolver
            .resolve_site(service, &site("Service.use", "service.Service.use"))
            .unwrap();
        assert_eq!(edge.target_symbol, use_sid);
    }

    #[test]
    fn test_unattributed_sites_are_dropped() {
        let mut a = module(1, "a.py", "a");
        add_function(&mut a, "g");
        let modules = collect(vec![a]);
        let resolver = CallResolver::new(&modules);

        let top_level = CallSite {
            caller: None,
            callee: Callee::Local("g".to_string()),
            line: 3,
        };
        assert!(resolver.resolve_site(&modules["a.py"], &top_level).is_none());
        assert!(resolver
            .resolve_site(&modules["a.py"], &site("not_indexed", "g"))
            .is_none());
    }
}
