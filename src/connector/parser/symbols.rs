use tree_sitter::{Node, Tree};

use crate::connector::parser::syntax::SyntaxParser;
use crate::domain::{Language, Symbol, SymbolKind, SymbolMetadata};

const SIGNATURE_TRUNCATE: usize = 200;

/// Extract all symbols from a parse tree, pre-order, with parent chains in
/// outer→inner order. Extraction failures on a single node are collected
/// and the walk continues.
pub fn extract_symbols(
    tree: &Tree,
    source: &str,
    language: Language,
) -> (Vec<Symbol>, Vec<String>) {
    let mut symbols = Vec::new();
    let mut errors = Vec::new();
    let mut parents: Vec<ScopeEntry> = Vec::new();

    walk(
        tree.root_node(),
        source,
        language,
        &mut parents,
        &mut symbols,
        &mut errors,
    );

    (symbols, errors)
}

struct ScopeEntry {
    name: String,
    is_class_like: bool,
}

fn walk(
    node: Node,
    source: &str,
    language: Language,
    parents: &mut Vec<ScopeEntry>,
    symbols: &mut Vec<Symbol>,
    errors: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.is_error() {
            continue;
        }

        match symbol_for_node(&child, source, language, parents) {
            Ok(Some(symbol)) => {
                let name = symbol.name().to_string();
                let is_class_like = matches!(
                    symbol.kind(),
                    SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum
                );
                symbols.push(symbol);
                parents.push(ScopeEntry {
                    name,
                    is_class_like,
                });
                walk(child, source, language, parents, symbols, errors);
                parents.pop();
            }
            Ok(None) => {
                walk(child, source, language, parents, symbols, errors);
            }
            Err(message) => {
                errors.push(message);
                walk(child, source, language, parents, symbols, errors);
            }
        }
    }
}

/// Kind table plus refinements for one node. `Ok(None)` means the node is
/// not a symbol; the walk descends either way.
fn symbol_for_node(
    node: &Node,
    source: &str,
    language: Language,
    parents: &[ScopeEntry],
) -> Result<Option<Symbol>, String> {
    let base_kind = match language {
        Language::Python => python_symbol_kind(node.kind()),
        _ => ecma_symbol_kind(node.kind()),
    };
    let Some(mut kind) = base_kind else {
        return Ok(None);
    };

    // Python assignments only count at module or class level; locals inside
    // function bodies are not symbols.
    if language == Language::Python && node.kind() == "assignment" && inside_function(node) {
        return Ok(None);
    }

    let Some(name) = symbol_name(node, source) else {
        // Anonymous declarations (default-exported expressions etc.) are
        // not addressable symbols.
        return Ok(None);
    };

    let in_class = parents.iter().any(|p| p.is_class_like);

    // Refinement: const-declared variables become constants; for Python,
    // ALL_CAPS module assignments are constants.
    if kind == SymbolKind::Variable {
        if language == Language::Python {
            if !name.is_empty()
                && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                && name
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
            {
                kind = SymbolKind::Constant;
            }
        } else if is_const_declaration(node) {
            kind = SymbolKind::Constant;
        }
        // A declarator bound to a function expression is a function.
        if has_function_value(node) {
            kind = SymbolKind::Function;
        }
    }

    // Refinement: function-shaped nodes inside a class body are methods.
    if kind == SymbolKind::Function && in_class {
        kind = SymbolKind::Method;
    }

    let span = SyntaxParser::span_of(node);
    let parent_names: Vec<String> = parents.iter().map(|p| p.name.clone()).collect();
    let metadata = extract_metadata(node, source, language);
    let signature = extract_signature(node, &name, kind, source, language);

    let mut symbol = Symbol::new(name, kind, span)
        .with_parents(parent_names)
        .with_metadata(metadata);
    if let Some(signature) = signature {
        symbol = symbol.with_signature(signature);
    }
    Ok(Some(symbol))
}

fn ecma_symbol_kind(node_kind: &str) -> Option<SymbolKind> {
    match node_kind {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            Some(SymbolKind::Function)
        }
        "class_declaration" | "abstract_class_declaration" => Some(SymbolKind::Class),
        "interface_declaration" => Some(SymbolKind::Interface),
        "type_alias_declaration" => Some(SymbolKind::Type),
        "enum_declaration" => Some(SymbolKind::Enum),
        "method_definition" | "abstract_method_signature" => Some(SymbolKind::Method),
        "public_field_definition" | "field_definition" | "property_signature" => {
            Some(SymbolKind::Property)
        }
        "variable_declarator" => Some(SymbolKind::Variable),
        "internal_module" => Some(SymbolKind::Namespace),
        "module_declaration" => Some(SymbolKind::Module),
        _ => None,
    }
}

fn python_symbol_kind(node_kind: &str) -> Option<SymbolKind> {
    match node_kind {
        "function_definition" => Some(SymbolKind::Function),
        "class_definition" => Some(SymbolKind::Class),
        "assignment" => Some(SymbolKind::Variable),
        _ => None,
    }
}

fn symbol_name(node: &Node, source: &str) -> Option<String> {
    let name_node = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("left"))?;
    // Only simple identifiers are symbol names; destructuring patterns and
    // attribute targets are skipped.
    match name_node.kind() {
        "identifier" | "type_identifier" | "property_identifier" => {
            Some(source[name_node.byte_range()].to_string())
        }
        _ => None,
    }
}

fn inside_function(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "function_definition" {
            return true;
        }
        current = parent.parent();
    }
    false
}

fn is_const_declaration(node: &Node) -> bool {
    node.parent().is_some_and(|parent| {
        parent.kind() == "lexical_declaration"
            && parent
                .child(0)
                .is_some_and(|token| token.kind() == "const")
    })
}

fn has_function_value(node: &Node) -> bool {
    node.child_by_field_name("value")
        .or_else(|| node.child_by_field_name("right"))
        .is_some_and(|value| {
            matches!(
                value.kind(),
                "arrow_function" | "function_expression" | "generator_function" | "function"
            )
        })
}

fn extract_metadata(node: &Node, source: &str, language: Language) -> SymbolMetadata {
    let mut metadata = SymbolMetadata::default();

    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        match child.kind() {
            "async" => metadata.is_async = true,
            "static" => metadata.is_static = true,
            "abstract" => metadata.is_abstract = true,
            "accessibility_modifier" => {
                metadata.visibility = Some(source[child.byte_range()].to_string());
            }
            "decorator" => {
                metadata
                    .decorators
                    .push(source[child.byte_range()].to_string());
            }
            _ => {}
        }
    }

    // Generator functions carry a `*` token or a generator node kind.
    if node.kind().contains("generator") {
        metadata.is_generator = true;
    }

    // A declarator's function value carries the async/generator flags.
    if let Some(value) = node.child_by_field_name("value") {
        if matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "generator_function"
        ) {
            if value.child(0).is_some_and(|t| t.kind() == "async") {
                metadata.is_async = true;
            }
            if value.kind() == "generator_function" {
                metadata.is_generator = true;
            }
        }
    }

    if let Some(type_node) = node.child_by_field_name("type") {
        let text = source[type_node.byte_range()].trim_start_matches(':').trim();
        metadata.type_annotation = Some(text.to_string());
    }

    // Python decorators live on the wrapping decorated_definition.
    if language == Language::Python {
        if let Some(parent) = node.parent() {
            if parent.kind() == "decorated_definition" {
                let mut cursor = parent.walk();
                for sibling in parent.named_children(&mut cursor) {
                    if sibling.kind() == "decorator" {
                        metadata
                            .decorators
                            .push(source[sibling.byte_range()].to_string());
                    }
                }
            }
        }
    }

    metadata.exported = is_exported(node, language);
    metadata
}

/// Walk upward looking for an enclosing export statement.
fn is_exported(node: &Node, language: Language) -> bool {
    if language == Language::Python {
        return false;
    }
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "export_statement" {
            return true;
        }
        // Stop at the first statement boundary above the declaration.
        if matches!(parent.kind(), "statement_block" | "class_body" | "program") {
            return false;
        }
        current = parent.parent();
    }
    false
}

fn extract_signature(
    node: &Node,
    name: &str,
    kind: SymbolKind,
    source: &str,
    language: Language,
) -> Option<String> {
    match kind {
        SymbolKind::Function | SymbolKind::Method => {
            let params = node
                .child_by_field_name("parameters")
                .map(|p| source[p.byte_range()].to_string())
                .or_else(|| {
                    // const f = (a, b) => ...
                    node.child_by_field_name("value")
                        .and_then(|v| v.child_by_field_name("parameters"))
                        .map(|p| source[p.byte_range()].to_string())
                })
                .unwrap_or_else(|| "()".to_string());
            let ret = node
                .child_by_field_name("return_type")
                .map(|r| {
                    let text = source[r.byte_range()].to_string();
                    // Python's return_type field is the bare type after `->`;
                    // TypeScript's type_annotation carries its own `: `.
                    if language == Language::Python {
                        format!(" -> {}", text)
                    } else {
                        text
                    }
                })
                .unwrap_or_default();
            let keyword = if language == Language::Python {
                "def"
            } else {
                "function"
            };
            Some(format!("{} {}{}{}", keyword, name, params, ret))
        }
        SymbolKind::Class => {
            let heritage = class_heritage(node, source);
            Some(format!("class {}{}", name, heritage))
        }
        SymbolKind::Interface => {
            let extends = node
                .named_children(&mut node.walk())
                .find(|c| c.kind() == "extends_type_clause" || c.kind() == "extends_clause")
                .map(|c| format!(" {}", source[c.byte_range()].trim()))
                .unwrap_or_default();
            Some(format!("interface {}{}", name, extends))
        }
        SymbolKind::Type => {
            let rhs = node
                .child_by_field_name("value")
                .map(|v| truncate(source[v.byte_range()].trim(), SIGNATURE_TRUNCATE))
                .unwrap_or_default();
            Some(format!("type {} = {}", name, rhs))
        }
        SymbolKind::Enum => Some(format!("enum {}", name)),
        SymbolKind::Variable | SymbolKind::Constant => {
            let keyword = declaration_keyword(node, language);
            let declarator = truncate(source[node.byte_range()].trim(), SIGNATURE_TRUNCATE);
            Some(format!("{} {}", keyword, declarator))
        }
        SymbolKind::Property => {
            let first_line = source[node.byte_range()].lines().next().unwrap_or("").trim();
            Some(first_line.to_string())
        }
        SymbolKind::Namespace | SymbolKind::Module => Some(format!("namespace {}", name)),
        _ => None,
    }
}

fn class_heritage(node: &Node, source: &str) -> String {
    let mut cursor = node.walk();
    // TS: class_heritage holds extends/implements; Python: superclasses
    // argument list.
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_heritage" => return format!(" {}", source[child.byte_range()].trim()),
            "argument_list" => return source[child.byte_range()].trim().to_string(),
            _ => {}
        }
    }
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        return source[superclasses.byte_range()].trim().to_string();
    }
    String::new()
}

fn declaration_keyword(node: &Node, language: Language) -> &'static str {
    if language == Language::Python {
        return "let"; // not reached for Python constants
    }
    match node.parent().map(|p| p.kind()) {
        Some("lexical_declaration") => {
            if is_const_declaration(node) {
                "const"
            } else {
                "let"
            }
        }
        Some("variable_declaration") => "var",
        _ => "const",
    }
}

/// Names of the base classes a class symbol inherits from, parsed off its
/// heritage clause. Used by the chunker for chunk context.
pub fn inheritance_from_signature(signature: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(idx) = signature.find(" extends ") {
        let rest = &signature[idx + " extends ".len()..];
        let rest = rest.split(" implements ").next().unwrap_or(rest);
        names.extend(split_type_list(rest));
    }
    if let Some(idx) = signature.find(" implements ") {
        names.extend(split_type_list(&signature[idx + " implements ".len()..]));
    }
    // Python style: class Derived(Base, Mixin)
    if names.is_empty() {
        if let Some(open) = signature.find('(') {
            if let Some(close) = signature.rfind(')') {
                if open < close {
                    names.extend(split_type_list(&signature[open + 1..close]));
                }
            }
        }
    }
    names
}

fn split_type_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|part| {
            part.trim()
                .split(['<', '('])
                .next()
                .unwrap_or("")
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::parser::GrammarRegistry;

    fn symbols_of(source: &str, language: Language) -> Vec<Symbol> {
        let registry = GrammarRegistry::new();
        let grammar = registry.load(language).unwrap();
        let tree = SyntaxParser::parse(source, &grammar, "test").unwrap();
        let (symbols, errors) = extract_symbols(&tree, source, language);
        assert!(errors.is_empty(), "extractor errors: {:?}", errors);
        symbols
    }

    #[test]
    fn test_typescript_functions_and_classes() {
        let source = r#"
export function add(a: number, b: number): number {
  return a + b;
}

class Calculator {
  multiply(a: number, b: number): number {
    return a * b;
  }
}

const PI = 3.14159;
const square = (x: number) => x * x;
"#;
        let symbols = symbols_of(source, Language::TypeScript);

        let add = symbols.iter().find(|s| s.name() == "add").unwrap();
        assert_eq!(add.kind(), SymbolKind::Function);
        assert!(add.metadata().exported);
        assert_eq!(
            add.signature(),
            Some("function add(a: number, b: number): number")
        );

        let multiply = symbols.iter().find(|s| s.name() == "multiply").unwrap();
        assert_eq!(multiply.kind(), SymbolKind::Method);
        assert_eq!(multiply.parents(), &["Calculator".to_string()]);

        let pi = symbols.iter().find(|s| s.name() == "PI").unwrap();
        assert_eq!(pi.kind(), SymbolKind::Constant);

        let square = symbols.iter().find(|s| s.name() == "square").unwrap();
        assert_eq!(square.kind(), SymbolKind::Function);
    }

    #[test]
    fn test_typescript_interface_and_type() {
        let source = r#"
interface Shape extends Drawable {
  area(): number;
}

type Point = { x: number; y: number };

enum Color { Red, Green }
"#;
        let symbols = symbols_of(source, Language::TypeScript);

        let shape = symbols.iter().find(|s| s.name() == "Shape").unwrap();
        assert_eq!(shape.kind(), SymbolKind::Interface);

        let point = symbols.iter().find(|s| s.name() == "Point").unwrap();
        assert_eq!(point.kind(), SymbolKind::Type);
        assert!(point.signature().unwrap().starts_with("type Point = "));

        let color = symbols.iter().find(|s| s.name() == "Color").unwrap();
        assert_eq!(color.kind(), SymbolKind::Enum);
        assert_eq!(color.signature(), Some("enum Color"));
    }

    #[test]
    fn test_python_methods_and_constants() {
        let source = r#"
MAX_RETRIES = 5

class Engine:
    def start(self):
        return True

async def run():
    pass
"#;
        let symbols = symbols_of(source, Language::Python);

        let max = symbols.iter().find(|s| s.name() == "MAX_RETRIES").unwrap();
        assert_eq!(max.kind(), SymbolKind::Constant);

        let start = symbols.iter().find(|s| s.name() == "start").unwrap();
        assert_eq!(start.kind(), SymbolKind::Method);
        assert_eq!(start.parents(), &["Engine".to_string()]);
        assert_eq!(start.signature(), Some("def start(self)"));

        let run = symbols.iter().find(|s| s.name() == "run").unwrap();
        assert_eq!(run.kind(), SymbolKind::Function);
        assert!(run.metadata().is_async);
    }

    #[test]
    fn test_parent_chain_outer_to_inner() {
        let source = r#"
class Outer:
    class Inner:
        def deep(self):
            pass
"#;
        let symbols = symbols_of(source, Language::Python);
        let deep = symbols.iter().find(|s| s.name() == "deep").unwrap();
        assert_eq!(deep.parents(), &["Outer".to_string(), "Inner".to_string()]);
    }

    #[test]
    fn test_inheritance_from_signature() {
        assert_eq!(
            inheritance_from_signature("class Foo extends Bar implements Baz, Qux"),
            vec!["Bar", "Baz", "Qux"]
        );
        assert_eq!(
            inheritance_from_signature("class Derived(Base, Mixin)"),
            vec!["Base", "Mixin"]
        );
        assert!(inheritance_from_signature("class Plain").is_empty());
    }

    #[test]
    fn test_syntax_error_still_emits_later_symbols() {
        let source = "%%%\n\ndef ok():\n    return 1\n";
        let registry = GrammarRegistry::new();
        let grammar = registry.load(Language::Python).unwrap();
        let tree = SyntaxParser::parse(source, &grammar, "test").unwrap();
        let (symbols, _) = extract_symbols(&tree, source, Language::Python);
        assert!(symbols.iter().any(|s| s.name() == "ok"));
    }
}
