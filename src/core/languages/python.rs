use regex::Regex;
use tree_sitter::{Node, Parser, Tree};

use crate::config::HeuristicsConfig;
use crate::core::call_graph::{collect_call_sites, CallSite, ReexportTracker};
use crate::core::imports::ImportNormalizer;
use crate::core::model::{
    DataField, DataShape, EnumDecl, ErrorType, Modifier, ModuleRecord, PatternRule, Route, Symbol,
    SymbolId, SymbolKind,
};
use crate::error::{CodecardError, Result};
use super::syntax::{
    decorator_expression, decorator_name, docstring, dotted_name, is_upper_name, line_range,
    node_text, string_list, string_literal, tail, unwrap_decorated,
};
use super::{ExtractContext, LanguageParser};

const MAX_TREE_DEPTH: usize = 500;

/// Dunders a class must define to be treated as a descriptor
const DESCRIPTOR_METHODS: [&str; 3] = ["__get__", "__set__", "__set_name__"];

/// Python-specific parser using Tree-sitter
pub struct PythonParser {
    parser: Parser,
    invariants: InvariantPatterns,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let python_language = tree_sitter_python::language();
        parser
            .set_language(&python_language)
            .map_err(|e| CodecardError::Parser(format!("Failed to set Python language: {}", e)))?;

        Ok(Self {
            parser,
            invariants: InvariantPatterns::new()?,
        })
    }

    /// Syntax tree of `source`, `None` when it contains syntax errors
    fn parse_tree(&mut self, source: &str) -> Result<Option<Tree>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| CodecardError::Parser("Failed to parse Python code".to_string()))?;

        if tree.root_node().has_error() {
            return Ok(None);
        }
        Ok(Some(tree))
    }
}

impl LanguageParser for PythonParser {
    fn extract(
        &mut self,
        source: &str,
        module: &mut ModuleRecord,
        context: &ExtractContext<'_>,
    ) -> Result<bool> {
        let Some(tree) = self.parse_tree(source)? else {
            return Ok(false);
        };
        let root = tree.root_node();

        let imports = ImportNormalizer::new(&module.path).collect(root, source);
        for _ in 0..imports.wildcards {
            module.flag(PatternRule::WildcardImport);
        }
        module.import_paths = ImportNormalizer::resolve(&imports.tokens, context.index);
        module.import_aliases = imports.aliases;

        let mut extraction = Extraction {
            next_id: module.next_symbol_id(),
            module: &mut *module,
            source,
            heuristics: context.heuristics,
            invariants: &self.invariants,
        };
        extraction.scan_patterns(root, 0);
        extraction.top_level(root);
        extraction.module_state(root);

        let exported = exported_names(root, source);
        ReexportTracker::track(module, exported.as_deref());

        module.parsed = true;
        Ok(true)
    }

    fn call_sites(&mut self, source: &str) -> Result<Option<Vec<CallSite>>> {
        Ok(self
            .parse_tree(source)?
            .map(|tree| collect_call_sites(tree.root_node(), source)))
    }

    fn file_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

/// `Requires:` / `Ensures:` doc-comment lines
struct InvariantPatterns {
    requires: Regex,
    ensures: Regex,
}

impl InvariantPatterns {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CodecardError::Parser(format!("Invalid pattern: {}", e)))
        };
        Ok(Self {
            requires: compile(r"(?i)^\s*requires:\s*(.*?)\s*$")?,
            ensures: compile(r"(?i)^\s*ensures:\s*(.*?)\s*$")?,
        })
    }

    /// `requires(..)`, `ensures(..)` or both; the last line of each kind wins
    fn render(&self, doc: &str) -> Option<String> {
        let mut requires = None;
        let mut ensures = None;
        for line in doc.lines() {
            if let Some(caps) = self.requires.captures(line) {
                requires = Some(caps[1].to_string());
            } else if let Some(caps) = self.ensures.captures(line) {
                ensures = Some(caps[1].to_string());
            }
        }

        let requires = requires.filter(|r| !r.is_empty());
        let ensures = ensures.filter(|e| !e.is_empty());
        match (requires, ensures) {
            (Some(r), Some(e)) => Some(format!("requires({}) ∧ ensures({})", r, e)),
            (Some(r), None) => Some(format!("requires({})", r)),
            (None, Some(e)) => Some(format!("ensures({})", e)),
            (None, None) => None,
        }
    }
}

/// State for filling one module from one syntax tree
struct Extraction<'a> {
    module: &'a mut ModuleRecord,
    source: &'a str,
    heuristics: &'a HeuristicsConfig,
    invariants: &'a InvariantPatterns,
    next_id: SymbolId,
}

impl<'a> Extraction<'a> {
    fn allocate_id(&mut self) -> SymbolId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn text(&self, node: Node) -> &'a str {
        node_text(node, self.source)
    }

    fn invariants_of(&self, definition: Node) -> Option<String> {
        let body = definition.child_by_field_name("body")?;
        let doc = docstring(body, self.source)?;
        self.invariants.render(&doc)
    }

    /// Lint-style rules that apply anywhere in the file
    fn scan_patterns(&mut self, node: Node, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            return;
        }

        match node.kind() {
            "except_clause" => {
                let mut cursor = node.walk();
                let bare = node
                    .named_children(&mut cursor)
                    .all(|child| matches!(child.kind(), "block" | "comment"));
                if bare {
                    self.module.flag(PatternRule::BareExcept);
                }
            }
            "call" => {
                let callee = node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "identifier")
                    .map(|f| self.text(f));
                match callee {
                    Some("eval") | Some("exec") => self.module.flag(PatternRule::EvalExec),
                    Some("print") => self.flag_print(),
                    _ => {}
                }
            }
            "exec_statement" => self.module.flag(PatternRule::EvalExec),
            "print_statement" => self.flag_print(),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.scan_patterns(child, depth + 1);
        }
    }

    fn flag_print(&mut self) {
        if !self.module.path.to_lowercase().contains("test") {
            self.module.flag(PatternRule::PrintInProduction);
        }
    }

    /// Top-level classes and functions, in source order
    fn top_level(&mut self, root: Node) {
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            let (decorators, definition) = unwrap_decorated(statement);
            match definition.kind() {
                "class_definition" => self.class(statement, definition, &decorators),
                "function_definition" => self.function(statement, definition, &decorators),
                _ => {}
            }
        }
    }

    fn decorator_names(&self, decorators: &[Node]) -> Vec<String> {
        decorators
            .iter()
            .filter_map(|d| decorator_name(*d, self.source))
            .collect()
    }

    fn class(&mut self, statement: Node, definition: Node, decorators: &[Node]) {
        let Some(name_node) = definition.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let decorator_names = self.decorator_names(decorators);
        let bases = self.bases(definition);

        let members: Vec<(Node, Vec<Node>, Node)> = definition
            .child_by_field_name("body")
            .map(|body| {
                let mut cursor = body.walk();
                body.named_children(&mut cursor)
                    .map(|statement| {
                        let (decorators, member) = unwrap_decorated(statement);
                        (statement, decorators, member)
                    })
                    .filter(|(_, _, member)| member.kind() == "function_definition")
                    .collect()
            })
            .unwrap_or_default();

        let member_names: Vec<&str> = members
            .iter()
            .filter_map(|(_, _, member)| member.child_by_field_name("name"))
            .map(|n| self.text(n))
            .collect();

        let id = self.allocate_id();
        let mut symbol = Symbol::new(self.module.id, id, SymbolKind::Class, name.clone());
        symbol.line_range = line_range(statement);
        symbol.invariants = self.invariants_of(definition);
        if DESCRIPTOR_METHODS
            .iter()
            .all(|dunder| member_names.contains(dunder))
        {
            symbol.modifiers.insert(Modifier::Descriptor);
        }
        symbol.decorators = decorator_names.clone();
        self.module.symbols.push(symbol);

        self.classify_class(definition, &name, &decorator_names, &bases);

        for (statement, decorators, member) in members {
            self.member(statement, member, &decorators, &name);
        }
    }

    /// Base-class expressions as written, keyword arguments skipped
    fn bases(&self, definition: Node) -> Vec<String> {
        let Some(superclasses) = definition.child_by_field_name("superclasses") else {
            return Vec::new();
        };
        let mut cursor = superclasses.walk();
        superclasses
            .named_children(&mut cursor)
            .filter(|base| !matches!(base.kind(), "keyword_argument" | "comment"))
            .map(|base| dotted_name(base, self.source).unwrap_or_else(|| self.text(base).to_string()))
            .collect()
    }

    /// Data shapes, error types and enumerations
    fn classify_class(&mut self, definition: Node, name: &str, decorators: &[String], bases: &[String]) {
        let ends_with_any =
            |value: &str, markers: &[String]| markers.iter().any(|m| value.ends_with(m.as_str()));
        let heuristics = self.heuristics;

        if bases.iter().any(|b| ends_with_any(b, &heuristics.enum_suffixes)) {
            let members = self.enum_members(definition);
            if !members.is_empty() {
                self.module.enums.push(EnumDecl {
                    name: name.to_string(),
                    members,
                });
            }
        }

        if bases
            .iter()
            .any(|b| ends_with_any(b, &heuristics.exception_suffixes))
        {
            self.module.errors.push(ErrorType {
                name: name.to_string(),
                category: "domain".to_string(),
                description: "custom exception".to_string(),
            });
        }

        let is_data_class = decorators
            .iter()
            .any(|d| ends_with_any(d, &heuristics.dataclass_markers));
        let is_model = bases.iter().any(|b| ends_with_any(b, &heuristics.model_bases));
        if is_data_class || is_model {
            let fields = self.annotated_fields(definition);
            self.module.data_shapes.push(DataShape {
                name: name.to_string(),
                fields,
            });
        }
    }

    fn annotated_fields(&self, definition: Node) -> Vec<DataField> {
        let mut fields: Vec<DataField> = Vec::new();
        for assignment in class_assignments(definition) {
            let (Some(target), Some(annotation)) = (
                assignment.child_by_field_name("left"),
                assignment.child_by_field_name("type"),
            ) else {
                continue;
            };
            if target.kind() != "identifier" {
                continue;
            }

            let field_name = self.text(target).to_string();
            let type_name = collapse_whitespace(self.text(annotation));
            match fields.iter_mut().find(|f| f.name == field_name) {
                Some(existing) => existing.type_name = type_name,
                None => fields.push(DataField {
                    name: field_name,
                    type_name,
                }),
            }
        }
        fields
    }

    fn enum_members(&self, definition: Node) -> Vec<String> {
        let mut members = Vec::new();
        for assignment in class_assignments(definition) {
            if assignment.child_by_field_name("type").is_some() {
                continue;
            }
            // `A = B = 1` chains nest on the right-hand side
            let mut current = Some(assignment);
            while let Some(node) = current {
                if let Some(target) = node.child_by_field_name("left") {
                    if target.kind() == "identifier" && is_upper_name(self.text(target)) {
                        members.push(self.text(target).to_string());
                    }
                }
                current = node
                    .child_by_field_name("right")
                    .filter(|right| right.kind() == "assignment");
            }
        }
        members
    }

    fn member(&mut self, statement: Node, member: Node, decorators: &[Node], class_name: &str) {
        let Some(name_node) = member.child_by_field_name("name") else {
            return;
        };
        let name = format!("{}.{}", class_name, self.text(name_node));
        let decorator_names = self.decorator_names(decorators);
        let modifiers: std::collections::BTreeSet<Modifier> = decorator_names
            .iter()
            .filter_map(|d| match tail(d) {
                "staticmethod" => Some(Modifier::Static),
                "classmethod" => Some(Modifier::Classmethod),
                "property" | "cached_property" => Some(Modifier::Property),
                _ => None,
            })
            .collect();

        let id = self.allocate_id();
        let mut symbol = if modifiers.contains(&Modifier::Property) {
            let mut symbol = Symbol::new(self.module.id, id, SymbolKind::Property, name.clone());
            symbol.modifiers.insert(Modifier::Property);
            self.module.properties.insert(name, id);
            symbol
        } else {
            let mut symbol = Symbol::new(self.module.id, id, SymbolKind::Function, name.clone());
            symbol.signature = Some(self.signature(member));
            symbol.raises = self.raises(member);
            symbol.modifiers = modifiers;
            self.module.functions.insert(name, id);
            symbol
        };
        symbol.decorators = decorator_names;
        symbol.invariants = self.invariants_of(member);
        symbol.line_range = line_range(statement);
        self.module.symbols.push(symbol);
    }

    fn function(&mut self, statement: Node, definition: Node, decorators: &[Node]) {
        let Some(name_node) = definition.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();

        let id = self.allocate_id();
        let mut symbol = Symbol::new(self.module.id, id, SymbolKind::Function, name.clone());
        symbol.signature = Some(self.signature(definition));
        symbol.raises = self.raises(definition);
        symbol.decorators = self.decorator_names(decorators);
        symbol.invariants = self.invariants_of(definition);
        symbol.line_range = line_range(statement);

        if self.has_mutable_default(definition) {
            self.module.flag(PatternRule::MutableDefault);
        }
        for decorator in decorators {
            if let Some(route) = self.route(*decorator, id) {
                self.module.routes.push(route);
            }
        }

        self.module.symbols.push(symbol);
        self.module.functions.insert(name, id);
    }

    /// `(a:int,b,*args,**kwargs)->Ret`
    fn signature(&self, definition: Node) -> String {
        let mut params: Vec<String> = Vec::new();

        if let Some(parameters) = definition.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            for param in parameters.named_children(&mut cursor) {
                let rendered = match param.kind() {
                    "identifier" => Some(self.text(param).to_string()),
                    "typed_parameter" => self.typed_parameter(param),
                    "default_parameter" => param
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string()),
                    "typed_default_parameter" => {
                        let name = param.child_by_field_name("name").map(|n| self.text(n));
                        let annotation = param.child_by_field_name("type").map(|t| self.text(t));
                        name.map(|name| with_annotation(name, annotation))
                    }
                    "list_splat_pattern" | "dictionary_splat_pattern" => {
                        Some(collapse_whitespace(self.text(param)))
                    }
                    _ => None,
                };
                params.extend(rendered);
            }
        }

        let returns = definition
            .child_by_field_name("return_type")
            .map(|r| collapse_whitespace(self.text(r)))
            .unwrap_or_else(|| "Any".to_string());

        format!("({})->{}", params.join(","), returns)
    }

    /// `name:type`, or a bare `*args` / `**kwargs` whatever their annotation
    fn typed_parameter(&self, param: Node) -> Option<String> {
        let target = param.named_child(0)?;
        match target.kind() {
            "list_splat_pattern" | "dictionary_splat_pattern" => {
                Some(collapse_whitespace(self.text(target)))
            }
            _ => {
                let annotation = param.child_by_field_name("type").map(|t| self.text(t));
                Some(with_annotation(self.text(target), annotation))
            }
        }
    }

    fn has_mutable_default(&self, definition: Node) -> bool {
        let Some(parameters) = definition.child_by_field_name("parameters") else {
            return false;
        };
        let mut cursor = parameters.walk();
        let mutable = parameters
            .named_children(&mut cursor)
            .filter(|p| matches!(p.kind(), "default_parameter" | "typed_default_parameter"))
            .filter_map(|p| p.child_by_field_name("value"))
            .any(|value| matches!(value.kind(), "list" | "dictionary" | "set"));
        mutable
    }

    /// Exception names raised in the body, nested functions excluded
    fn raises(&self, definition: Node) -> Vec<String> {
        let mut seen = Vec::new();
        if let Some(body) = definition.child_by_field_name("body") {
            self.collect_raises(body, &mut seen, 0);
        }
        seen
    }

    fn collect_raises(&self, node: Node, seen: &mut Vec<String>, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            return;
        }

        match node.kind() {
            "function_definition" => return,
            "raise_statement" => {
                let name = self.raised_name(node);
                if !seen.contains(&name) {
                    seen.push(name);
                }
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_raises(child, seen, depth + 1);
        }
    }

    fn raised_name(&self, raise: Node) -> String {
        let cause = raise.child_by_field_name("cause").map(|c| c.id());
        let mut cursor = raise.walk();
        let exception = raise
            .named_children(&mut cursor)
            .find(|child| child.kind() != "comment" && Some(child.id()) != cause);

        let Some(exception) = exception else {
            return "ReRaise".to_string();
        };
        let named = match exception.kind() {
            "call" => exception.child_by_field_name("function"),
            "identifier" | "attribute" => Some(exception),
            _ => None,
        };
        named
            .and_then(|n| dotted_name(n, self.source))
            .unwrap_or_else(|| "Exception".to_string())
    }

    fn route(&self, decorator: Node, id: SymbolId) -> Option<Route> {
        let call = decorator_expression(decorator).filter(|e| e.kind() == "call")?;
        let name = dotted_name(call.child_by_field_name("function")?, self.source)?;
        let arguments = call.child_by_field_name("arguments")?;

        let mut cursor = arguments.walk();
        let args: Vec<Node> = arguments.named_children(&mut cursor).collect();
        let path = args
            .iter()
            .find(|a| !matches!(a.kind(), "keyword_argument" | "comment"))
            .and_then(|a| string_literal(*a, self.source));

        let segments: Vec<&str> = name.split('.').collect();
        let heuristics = self.heuristics;

        if let [_, verb] = segments.as_slice() {
            if heuristics.http_verbs.iter().any(|v| v == verb) {
                return path.map(|path| Route {
                    symbol: id,
                    verb: verb.to_uppercase(),
                    path,
                    status_codes: heuristics.default_status_codes.clone(),
                });
            }
        }

        if segments.len() >= 2 && tail(&name) == heuristics.route_attribute {
            let path = path?;
            let verb = args
                .iter()
                .filter(|a| a.kind() == "keyword_argument")
                .find(|a| {
                    a.child_by_field_name("name")
                        .map_or(false, |n| self.text(n) == "methods")
                })
                .and_then(|a| a.child_by_field_name("value"))
                .and_then(|value| string_list(value, self.source))
                .and_then(|methods| methods.into_iter().next())
                .map(|verb| verb.to_uppercase())
                .unwrap_or_else(|| heuristics.default_verb.clone());
            return Some(Route {
                symbol: id,
                verb,
                path,
                status_codes: heuristics.default_status_codes.clone(),
            });
        }

        None
    }

    /// Module-level assignments are shared state in service modules
    fn module_state(&mut self, root: Node) {
        if !self.module.role_tags.contains("svc") {
            return;
        }
        let mut cursor = root.walk();
        let assignments = root
            .named_children(&mut cursor)
            .filter(|statement| statement.kind() == "expression_statement")
            .filter_map(|statement| statement.named_child(0))
            .filter(|expr| expr.kind() == "assignment" && expr.child_by_field_name("type").is_none())
            .count();
        for _ in 0..assignments {
            self.module.flag(PatternRule::GlobalStateInService);
        }
    }
}

/// Assignment nodes directly in a class body
fn class_assignments(definition: Node) -> Vec<Node> {
    let Some(body) = definition.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .filter(|statement| statement.kind() == "expression_statement")
        .filter_map(|statement| statement.named_child(0))
        .filter(|expr| expr.kind() == "assignment")
        .collect()
}

/// Names listed in a top-level `__all__` list or tuple; `+=` extends it
fn exported_names(root: Node, source: &str) -> Option<Vec<String>> {
    let mut exported: Option<Vec<String>> = None;
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        if statement.kind() != "expression_statement" {
            continue;
        }
        let Some(expr) = statement.named_child(0) else {
            continue;
        };
        let is_all = expr
            .child_by_field_name("left")
            .map_or(false, |left| node_text(left, source) == "__all__");
        if !is_all {
            continue;
        }
        let Some(names) = expr
            .child_by_field_name("right")
            .and_then(|right| string_list(right, source))
        else {
            continue;
        };
        match expr.kind() {
            "assignment" => exported = Some(names),
            "augmented_assignment" => exported.get_or_insert_with(Vec::new).extend(names),
            _ => {}
        }
    }
    exported
}

fn with_annotation(name: &str, annotation: Option<&str>) -> String {
    match annotation {
        Some(annotation) => format!("{}:{}", name, collapse_whitespace(annotation)),
        None => name.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
