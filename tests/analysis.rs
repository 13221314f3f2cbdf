use std::collections::HashSet;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use codecard::core::{CallEdge, ModuleRecord, ResultValidator, NO_SYMBOL};
use codecard::{analyze, resolve_calls, AnalysisResult, Config, Engine};

fn tree(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (path, content) in files {
        temp.child(path).write_str(content).unwrap();
    }
    temp
}

fn analyze_and_resolve(temp: &TempDir) -> AnalysisResult {
    let mut result = analyze(temp.path(), None, None).unwrap();
    resolve_calls(temp.path(), &mut result).unwrap();
    result
}

fn edge(caller: &ModuleRecord, from: &str, target: &ModuleRecord, to: &str) -> CallEdge {
    CallEdge {
        caller: caller.functions[from],
        target_module: target.id,
        target_symbol: target.functions[to],
    }
}

const A_PY: &str = "def f():\n    g()\n\ndef g():\n    pass\n";

#[test]
fn local_call_yields_exactly_one_edge() {
    let temp = tree(&[("a.py", A_PY)]);
    let result = analyze_and_resolve(&temp);

    let a = &result.modules["a.py"];
    assert_eq!(a.calls, vec![edge(a, "f", a, "g")]);
}

#[test]
fn qualified_call_targets_the_indexed_function() {
    let temp = tree(&[
        ("a.py", A_PY),
        ("b.py", "import a\n\ndef h():\n    a.f()\n"),
    ]);
    let result = analyze_and_resolve(&temp);

    let a = &result.modules["a.py"];
    let b = &result.modules["b.py"];
    assert_eq!(b.calls, vec![edge(b, "h", a, "f")]);
    assert_ne!(b.calls[0].target_symbol, NO_SYMBOL);
    assert_eq!(result.total_calls(), 2);
}

#[test]
fn package_init_reexport_round_trip() {
    let temp = tree(&[
        ("pkg/__init__.py", "from .util import helper\n"),
        ("pkg/util.py", "def helper():\n    return 1\n"),
        ("main.py", "import pkg\n\ndef run():\n    return pkg.helper()\n"),
    ]);
    let result = analyze_and_resolve(&temp);

    let init = &result.modules["pkg/__init__.py"];
    assert_eq!(
        init.reexports.get("pkg.helper").map(String::as_str),
        Some("pkg.util.helper")
    );

    let util = &result.modules["pkg/util.py"];
    let main = &result.modules["main.py"];
    assert_eq!(main.calls, vec![edge(main, "run", util, "helper")]);
}

#[test]
fn unknown_member_falls_back_to_module_anchor() {
    let temp = tree(&[
        ("lib.py", "VALUE = 1\n"),
        ("main.py", "import lib\n\ndef go():\n    lib.unknown_name()\n"),
    ]);
    let result = analyze_and_resolve(&temp);

    let lib = &result.modules["lib.py"];
    let main = &result.modules["main.py"];
    assert_eq!(
        main.calls,
        vec![CallEdge {
            caller: main.functions["go"],
            target_module: lib.id,
            target_symbol: NO_SYMBOL,
        }]
    );
}

#[test]
fn top_level_calls_are_dropped() {
    let temp = tree(&[("script.py", "def g():\n    pass\n\ng()\nprint(g())\n")]);
    let result = analyze_and_resolve(&temp);

    assert!(result.modules["script.py"].calls.is_empty());
}

#[test]
fn property_access_never_becomes_an_edge() {
    let temp = tree(&[
        (
            "service.py",
            "class Service:\n    @property\n    def config(self):\n        return {}\n\n    def use(self):\n        return self.config()\n",
        ),
        (
            "client.py",
            "import service\n\ndef run():\n    service.Service.config()\n    service.Service.use()\n",
        ),
    ]);
    let result = analyze_and_resolve(&temp);

    let service_module = &result.modules["service.py"];
    assert!(service_module.properties.contains_key("Service.config"));
    assert!(service_module.calls.is_empty());

    let client = &result.modules["client.py"];
    assert_eq!(client.calls, vec![edge(client, "run", service_module, "Service.use")]);
}

#[test]
fn invalid_syntax_does_not_affect_other_files() {
    let temp = tree(&[
        ("broken.py", "def broken(:\n    pass\n"),
        (
            "models.py",
            "from dataclasses import dataclass\n\n@dataclass\nclass User:\n    name: str\n    age: int\n",
        ),
        ("use.py", "import models\n\ndef make():\n    return models.User()\n"),
    ]);
    let result = analyze_and_resolve(&temp);

    let broken = &result.modules["broken.py"];
    assert!(!broken.parsed);
    assert_eq!(broken.symbols.len(), 1);
    assert!(broken.calls.is_empty());

    let models = &result.modules["models.py"];
    assert!(models.parsed);
    assert_eq!(models.data_shapes.len(), 1);
    assert_eq!(models.data_shapes[0].fields.len(), 2);

    let usage = &result.modules["use.py"];
    assert_eq!(usage.calls.len(), 1);
    assert_eq!(usage.calls[0].target_module, models.id);
    assert_eq!(result.stats().unparsed, 1);
}

#[test]
fn results_are_deterministic_with_unique_ids() {
    let temp = tree(&[
        ("a.py", A_PY),
        ("b.py", "import a\n\ndef h():\n    a.f()\n"),
        ("pkg/__init__.py", "from .util import helper\n"),
        ("pkg/util.py", "def helper():\n    return 1\n"),
        ("web/app.ts", "export const x = 1;\n"),
    ]);
    let first = analyze_and_resolve(&temp);
    let second = analyze_and_resolve(&temp);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    let module_ids: HashSet<_> = first.modules.values().map(|m| m.id).collect();
    assert_eq!(module_ids.len(), first.modules.len());
    assert!(!module_ids.contains(&0));
    for module in first.modules.values() {
        let symbol_ids: HashSet<_> = module.symbols.iter().map(|s| s.id).collect();
        assert_eq!(symbol_ids.len(), module.symbols.len());
    }

    assert!(ResultValidator::validate(&first).is_valid());
    assert_eq!(first.languages, vec!["py".to_string(), "ts".to_string()]);
}

#[test]
fn parallel_run_matches_sequential_run() {
    let temp = tree(&[
        ("a.py", A_PY),
        ("b.py", "import a\n\ndef h():\n    a.f()\n"),
        ("c.py", "from a import g as gee\n\ndef k():\n    gee()\n"),
    ]);
    let sequential = Engine::default().run(temp.path(), None, None).unwrap();

    let mut config = Config::default();
    config.performance.min_files_for_parallel = 0;
    config.performance.max_workers = 2;
    let parallel = Engine::new(config).run(temp.path(), None, None).unwrap();

    assert_eq!(
        serde_json::to_string(&sequential).unwrap(),
        serde_json::to_string(&parallel).unwrap()
    );
}

#[test]
fn default_config_round_trips_through_toml() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("codecard.toml");
    Config::default().save(file.path()).unwrap();

    file.assert(predicate::path::exists());
    file.assert(predicate::str::contains("[performance]"));
    file.assert(predicate::str::contains("max_workers = 4"));

    let loaded = Config::load(file.path()).unwrap();
    assert_eq!(loaded.performance.min_files_for_parallel, 50);
    assert_eq!(loaded.heuristics.default_role, "mod");
}
