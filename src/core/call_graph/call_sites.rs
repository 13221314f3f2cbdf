// src/core/call_graph/call_sites.rs
use tree_sitter::Node;

use crate::core::languages::syntax::{dotted_segments, node_text};

const MAX_TREE_DEPTH: usize = 500;

/// What a call expression names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// `name(...)`
    Local(String),
    /// `a.b.c(...)`, a pure attribute chain split into segments
    Qualified(Vec<String>),
}

/// One call expression and the definition it sits in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Function-table key of the enclosing definition; `None` when the call is
    /// at module level, in a class body, a lambda or a nested definition
    pub caller: Option<String>,
    pub callee: Callee,
    pub line: usize,
}

/// Enclosing definition carried down the tree
#[derive(Debug, Clone)]
enum Scope {
    Module,
    /// Body of a top-level class
    Class(String),
    /// Inside some function; the key of the indexed definition if there is one
    Function(Option<String>),
}

impl Scope {
    fn caller(&self) -> Option<String> {
        match self {
            Scope::Function(caller) => caller.clone(),
            Scope::Module | Scope::Class(_) => None,
        }
    }
}

/// Every call expression under `root`, in source order
pub fn collect_call_sites(root: Node, source: &str) -> Vec<CallSite> {
    let mut sites = Vec::new();
    visit(root, source, &Scope::Module, &mut sites, 0);
    sites
}

fn visit(node: Node, source: &str, scope: &Scope, sites: &mut Vec<CallSite>, depth: usize) {
    if depth > MAX_TREE_DEPTH {
        return;
    }

    match node.kind() {
        "function_definition" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string());
            let key = match (scope, name) {
                (Scope::Module, Some(name)) => Some(name),
                (Scope::Class(class), Some(name)) => Some(format!("{}.{}", class, name)),
                _ => None,
            };
            visit_scoped(node, source, scope, &Scope::Function(key), sites, depth);
            return;
        }
        "class_definition" => {
            let body_scope = match scope {
                Scope::Module => node
                    .child_by_field_name("name")
                    .map(|n| Scope::Class(node_text(n, source).to_string()))
                    .unwrap_or(Scope::Function(None)),
                Scope::Class(_) => Scope::Function(None),
                Scope::Function(caller) => Scope::Function(caller.clone()),
            };
            visit_scoped(node, source, scope, &body_scope, sites, depth);
            return;
        }
        "lambda" => {
            visit_scoped(node, source, scope, &Scope::Function(None), sites, depth);
            return;
        }
        "call" => {
            if let Some(callee) = node.child_by_field_name("function").and_then(|f| callee(f, source)) {
                sites.push(CallSite {
                    caller: scope.caller(),
                    callee,
                    line: node.start_position().row + 1,
                });
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        visit(child, source, scope, sites, depth + 1);
    }
}

/// The `body` field runs in `inner`; everything else (defaults, bases,
/// annotations) is evaluated in the surrounding `outer` scope
fn visit_scoped(
    node: Node,
    source: &str,
    outer: &Scope,
    inner: &Scope,
    sites: &mut Vec<CallSite>,
    depth: usize,
) {
    let body_id = node.child_by_field_name("body").map(|b| b.id());
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let scope = if Some(child.id()) == body_id { inner } else { outer };
        visit(child, source, scope, sites, depth + 1);
    }
}

fn callee(function: Node, source: &str) -> Option<Callee> {
    match function.kind() {
        "identifier" => Some(Callee::Local(node_text(function, source).to_string())),
        "attribute" => dotted_segments(function, source).map(Callee::Qualified),
        _ => None,
    }
}
