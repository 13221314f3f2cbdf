// src/core/languages/syntax.rs
//! Small helpers over tree-sitter Python nodes shared by extraction, import
//! normalization and call-site collection.

use tree_sitter::Node;

/// Source text covered by a node
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Segments of a pure `a.b.c` identifier/attribute chain.
///
/// Anything else in the chain (calls, subscripts, literals) yields `None`.
pub fn dotted_segments(node: Node, source: &str) -> Option<Vec<String>> {
    match node.kind() {
        "identifier" => Some(vec![node_text(node, source).to_string()]),
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attribute = node.child_by_field_name("attribute")?;
            let mut segments = dotted_segments(object, source)?;
            segments.push(node_text(attribute, source).to_string());
            Some(segments)
        }
        _ => None,
    }
}

pub fn dotted_name(node: Node, source: &str) -> Option<String> {
    dotted_segments(node, source).map(|segments| segments.join("."))
}

/// Value of a plain string literal; f-strings with interpolations and
/// implicit concatenations are rejected
pub fn string_literal(node: Node, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|child| child.kind() == "interpolation")
    {
        return None;
    }

    let text = node_text(node, source);
    let body = text.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= quote.len() * 2 && body.starts_with(quote) && body.ends_with(quote) {
            return Some(body[quote.len()..body.len() - quote.len()].to_string());
        }
    }
    None
}

/// Every string in a list or tuple literal, skipping non-string elements
pub fn string_list(node: Node, source: &str) -> Option<Vec<String>> {
    if !matches!(node.kind(), "list" | "tuple") {
        return None;
    }
    let mut cursor = node.walk();
    let items = node
        .named_children(&mut cursor)
        .filter_map(|item| string_literal(item, source))
        .collect();
    Some(items)
}

/// Docstring of a module, class or function body block
pub fn docstring(body: Node, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    string_literal(first.named_child(0)?, source)
}

/// Expression after the `@` of a decorator node
pub fn decorator_expression(decorator: Node) -> Option<Node> {
    decorator.named_child(0)
}

/// Decorator name as written, with any call arguments dropped
pub fn decorator_name(decorator: Node, source: &str) -> Option<String> {
    let expr = decorator_expression(decorator)?;
    let target = if expr.kind() == "call" {
        expr.child_by_field_name("function")?
    } else {
        expr
    };
    dotted_name(target, source).or_else(|| Some(node_text(target, source).to_string()))
}

/// Decorators and the wrapped definition of a possibly-decorated statement
pub fn unwrap_decorated<'tree>(node: Node<'tree>) -> (Vec<Node<'tree>>, Node<'tree>) {
    if node.kind() != "decorated_definition" {
        return (Vec::new(), node);
    }
    let mut cursor = node.walk();
    let decorators = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "decorator")
        .collect();
    let definition = node.child_by_field_name("definition").unwrap_or(node);
    (decorators, definition)
}

/// Last segment of a dotted name
pub fn tail(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Upper-case in the Python sense: at least one cased letter, none lower-case
pub fn is_upper_name(name: &str) -> bool {
    name.chars().any(char::is_alphabetic) && !name.chars().any(char::is_lowercase)
}

/// 1-based inclusive line range of a node
pub fn line_range(node: Node) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::language()).unwrap();
        parser.parse(source, None).unwrap()
    }

    /// First expression of the first statement
    fn first_expression(tree: &Tree) -> Node<'_> {
        tree.root_node().named_child(0).unwrap().named_child(0).unwrap()
    }

    #[test]
    fn test_dotted_segments_of_pure_chain() {
        let source = "a.b.c\n";
        let tree = parse(source);
        let segments = dotted_segments(first_expression(&tree), source).unwrap();
        assert_eq!(segments, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dotted_segments_reject_calls_in_chain() {
        let source = "a().b\n";
        let tree = parse(source);
        assert!(dotted_segments(first_expression(&tree), source).is_none());
    }

    #[test]
    fn test_string_literals() {
        let source = "'/users'\n";
        let tree = parse(source);
        assert_eq!(
            string_literal(first_expression(&tree), source),
            Some("/users".to_string())
        );

        let source = "f\"/items/{item_id}\"\n";
        let tree = parse(source);
        assert_eq!(string_literal(first_expression(&tree), source), None);
    }

    #[test]
    fn test_string_list() {
        let source = "['a', 'b', 3]\n";
        let tree = parse(source);
        assert_eq!(
            string_list(first_expression(&tree), source),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_docstring_of_function_body() {
        let source = "def f():\n    \"\"\"Requires: x > 0\"\"\"\n    return 1\n";
        let tree = parse(source);
        let function = tree.root_node().named_child(0).unwrap();
        let body = function.child_by_field_name("body").unwrap();
        assert_eq!(docstring(body, source), Some("Requires: x > 0".to_string()));
    }

    #[test]
    fn test_upper_names() {
        assert!(is_upper_name("RED"));
        assert!(is_upper_name("MAX_SIZE_2"));
        assert!(!is_upper_name("Red"));
        assert!(!is_upper_name("_"));
        assert_eq!(tail("app.route"), "route");
        assert_eq!(tail("route"), "route");
    }
}
