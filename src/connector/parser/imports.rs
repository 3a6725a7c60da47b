use tree_sitter::{Node, Tree};

use crate::connector::parser::syntax::SyntaxParser;
use crate::domain::{
    Export, ExportKind, ExportSpecifier, Import, ImportKind, ImportSpecifier, Language,
};

/// Extract top-level imports and exports, normalized to the canonical
/// kinds. Unrecognized shapes are skipped, never fatal.
pub fn extract_imports_exports(
    tree: &Tree,
    source: &str,
    language: Language,
) -> (Vec<Import>, Vec<Export>) {
    let mut imports = Vec::new();
    let mut exports = Vec::new();

    let root = tree.root_node();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match language {
            Language::Python => match node.kind() {
                "import_statement" => imports.extend(python_import(&node, source)),
                "import_from_statement" => imports.extend(python_from_import(&node, source)),
                _ => {}
            },
            _ => match node.kind() {
                "import_statement" => imports.extend(ecma_import(&node, source)),
                "export_statement" => exports.extend(ecma_export(&node, source)),
                "lexical_declaration" | "variable_declaration" | "expression_statement" => {
                    imports.extend(require_import(&node, source))
                }
                _ => {}
            },
        }
    }

    (imports, exports)
}

fn string_content(node: &Node, source: &str) -> String {
    source[node.byte_range()]
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

/// `import X from "m"`, `import { a, b as c } from "m"`,
/// `import * as ns from "m"`, `import "m"`.
fn ecma_import(node: &Node, source: &str) -> Vec<Import> {
    let span = SyntaxParser::span_of(node);
    let source_path = node
        .child_by_field_name("source")
        .map(|s| string_content(&s, source));

    let mut cursor = node.walk();
    let clause = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "import_clause");

    let Some(clause) = clause else {
        // No clause at all: side-effect import.
        return vec![Import {
            kind: ImportKind::SideEffect,
            source: source_path,
            specifiers: Vec::new(),
            span,
        }];
    };

    let mut imports = Vec::new();
    let mut clause_cursor = clause.walk();
    for child in clause.named_children(&mut clause_cursor) {
        match child.kind() {
            "identifier" => imports.push(Import {
                kind: ImportKind::Default,
                source: source_path.clone(),
                specifiers: vec![ImportSpecifier::new(
                    "default",
                    &source[child.byte_range()],
                )],
                span,
            }),
            "namespace_import" => {
                let local = child
                    .named_children(&mut child.walk())
                    .find(|c| c.kind() == "identifier")
                    .map(|c| source[c.byte_range()].to_string())
                    .unwrap_or_default();
                imports.push(Import {
                    kind: ImportKind::Namespace,
                    source: source_path.clone(),
                    specifiers: vec![ImportSpecifier::new("*", local)],
                    span,
                });
            }
            "named_imports" => {
                let mut specifiers = Vec::new();
                let mut named_cursor = child.walk();
                for spec in child.named_children(&mut named_cursor) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let imported = spec
                        .child_by_field_name("name")
                        .map(|n| source[n.byte_range()].to_string())
                        .unwrap_or_default();
                    let local = spec
                        .child_by_field_name("alias")
                        .map(|a| source[a.byte_range()].to_string())
                        .unwrap_or_else(|| imported.clone());
                    specifiers.push(ImportSpecifier::new(imported, local));
                }
                imports.push(Import {
                    kind: ImportKind::Named,
                    source: source_path.clone(),
                    specifiers,
                    span,
                });
            }
            _ => {}
        }
    }

    if imports.is_empty() {
        imports.push(Import {
            kind: ImportKind::SideEffect,
            source: source_path,
            specifiers: Vec::new(),
            span,
        });
    }
    imports
}

/// `const x = require("m")` and bare `require("m")`.
fn require_import(node: &Node, source: &str) -> Vec<Import> {
    let mut imports = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if current.kind() == "call_expression" {
            let is_require = current
                .child_by_field_name("function")
                .is_some_and(|f| &source[f.byte_range()] == "require");
            if is_require {
                let module = current
                    .child_by_field_name("arguments")
                    .and_then(|args| args.named_child(0))
                    .filter(|arg| arg.kind() == "string")
                    .map(|arg| string_content(&arg, source));
                let local = binding_name_for_require(&current, source);
                imports.push(Import {
                    kind: ImportKind::Require,
                    source: module,
                    specifiers: local
                        .map(|l| vec![ImportSpecifier::new("*", l)])
                        .unwrap_or_default(),
                    span: SyntaxParser::span_of(&current),
                });
                continue;
            }
        }
        for i in 0..current.named_child_count() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    imports
}

fn binding_name_for_require(call: &Node, source: &str) -> Option<String> {
    let mut current = call.parent();
    while let Some(parent) = current {
        if parent.kind() == "variable_declarator" {
            return parent
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| source[n.byte_range()].to_string());
        }
        if parent.kind() == "expression_statement" || parent.kind() == "program" {
            return None;
        }
        current = parent.parent();
    }
    None
}

/// `export { a as b }`, `export default ...`, `export * from "m"`,
/// `export const x = ...` and friends.
fn ecma_export(node: &Node, source: &str) -> Vec<Export> {
    let span = SyntaxParser::span_of(node);
    let source_path = node
        .child_by_field_name("source")
        .map(|s| string_content(&s, source));

    // `export default <expr>` has a `value` field; declarations hang off
    // `declaration`.
    if let Some(declaration) = node.child_by_field_name("declaration") {
        let is_default = node.child(1).is_some_and(|t| t.kind() == "default");
        let name = declaration
            .child_by_field_name("name")
            .map(|n| source[n.byte_range()].to_string());
        let specifiers = name
            .map(|n| {
                vec![if is_default {
                    ExportSpecifier::new(n, "default")
                } else {
                    ExportSpecifier::plain(n)
                }]
            })
            .unwrap_or_default();
        return vec![Export {
            kind: if is_default {
                ExportKind::Default
            } else {
                ExportKind::Declaration
            },
            source: source_path,
            specifiers,
            span,
        }];
    }

    if node.child_by_field_name("value").is_some() {
        return vec![Export {
            kind: ExportKind::Default,
            source: source_path,
            specifiers: Vec::new(),
            span,
        }];
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                let mut specifiers = Vec::new();
                let mut clause_cursor = child.walk();
                for spec in child.named_children(&mut clause_cursor) {
                    if spec.kind() != "export_specifier" {
                        continue;
                    }
                    let local = spec
                        .child_by_field_name("name")
                        .map(|n| source[n.byte_range()].to_string())
                        .unwrap_or_default();
                    let exported = spec
                        .child_by_field_name("alias")
                        .map(|a| source[a.byte_range()].to_string())
                        .unwrap_or_else(|| local.clone());
                    specifiers.push(ExportSpecifier::new(local, exported));
                }
                return vec![Export {
                    kind: ExportKind::Named,
                    source: source_path,
                    specifiers,
                    span,
                }];
            }
            "namespace_export" => {
                return vec![Export {
                    kind: ExportKind::Namespace,
                    source: source_path,
                    specifiers: Vec::new(),
                    span,
                }];
            }
            _ => {}
        }
    }

    // `export * from "m"` has no named clause.
    if source_path.is_some() {
        return vec![Export {
            kind: ExportKind::Namespace,
            source: source_path,
            specifiers: Vec::new(),
            span,
        }];
    }
    Vec::new()
}

/// `import a.b, c`: one namespace import per dotted name.
fn python_import(node: &Node, source: &str) -> Vec<Import> {
    let span = SyntaxParser::span_of(node);
    let mut imports = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => imports.push(Import {
                kind: ImportKind::Namespace,
                source: Some(source[child.byte_range()].to_string()),
                specifiers: vec![ImportSpecifier::plain(&source[child.byte_range()])],
                span,
            }),
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| source[n.byte_range()].to_string())
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| source[a.byte_range()].to_string())
                    .unwrap_or_else(|| name.clone());
                imports.push(Import {
                    kind: ImportKind::Namespace,
                    source: Some(name.clone()),
                    specifiers: vec![ImportSpecifier::new(name, alias)],
                    span,
                });
            }
            _ => {}
        }
    }
    imports
}

/// `from m import a, b as c`: a single named import.
fn python_from_import(node: &Node, source: &str) -> Vec<Import> {
    let span = SyntaxParser::span_of(node);
    let module = node
        .child_by_field_name("module_name")
        .map(|m| source[m.byte_range()].to_string());

    let mut specifiers = Vec::new();
    let mut wildcard = false;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        // Skip the module name itself.
        if node
            .child_by_field_name("module_name")
            .is_some_and(|m| m.id() == child.id())
        {
            continue;
        }
        match child.kind() {
            "dotted_name" | "identifier" => {
                specifiers.push(ImportSpecifier::plain(&source[child.byte_range()]));
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| source[n.byte_range()].to_string())
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| source[a.byte_range()].to_string())
                    .unwrap_or_else(|| name.clone());
                specifiers.push(ImportSpecifier::new(name, alias));
            }
            "wildcard_import" => wildcard = true,
            _ => {}
        }
    }

    vec![Import {
        kind: if wildcard {
            ImportKind::Namespace
        } else {
            ImportKind::Named
        },
        source: module,
        specifiers,
        span,
    }]
}
