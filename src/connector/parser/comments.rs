use tree_sitter::{Node, Tree};

use crate::connector::parser::syntax::SyntaxParser;
use crate::domain::{
    Comment, CommentKind, DocParam, Documentation, Language, Symbol,
};

/// Extract line, block, JSDoc and docstring comments. JSDoc blocks and
/// docstrings also carry a parsed documentation structure.
pub fn extract_comments(tree: &Tree, source: &str, language: Language) -> Vec<Comment> {
    let mut comments = Vec::new();
    if language == Language::Python {
        // Module docstring lives on the root node itself.
        if let Some(docstring) = docstring_of(&tree.root_node(), source) {
            comments.push(docstring);
        }
    }
    collect(tree.root_node(), source, language, &mut comments);
    comments.sort_by_key(|c| c.span.start_byte);
    comments
}

fn collect(node: Node, source: &str, language: Language, out: &mut Vec<Comment>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "comment" {
            let text = source[child.byte_range()].to_string();
            let kind = classify(&text, language);
            let mut comment = Comment::new(text, kind, SyntaxParser::span_of(&child));
            if kind == CommentKind::Jsdoc {
                comment.documentation = Some(parse_jsdoc(&comment.text));
            }
            out.push(comment);
            continue;
        }

        if language == Language::Python {
            if let Some(docstring) = docstring_of(&child, source) {
                out.push(docstring);
            }
        }

        collect(child, source, language, out);
    }
}

fn classify(text: &str, language: Language) -> CommentKind {
    if language == Language::Python {
        return CommentKind::Line;
    }
    if text.starts_with("/**") {
        CommentKind::Jsdoc
    } else if text.starts_with("/*") {
        CommentKind::Block
    } else {
        CommentKind::Line
    }
}

/// A string literal appearing as the first statement of a module, class or
/// function body is a docstring.
fn docstring_of(node: &Node, source: &str) -> Option<Comment> {
    let body = match node.kind() {
        "function_definition" | "class_definition" => node.child_by_field_name("body")?,
        "module" => *node,
        _ => return None,
    };
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }

    let raw = &source[string.byte_range()];
    let text = strip_string_quotes(raw);
    let mut comment = Comment::new(text, CommentKind::Docstring, SyntaxParser::span_of(&string));
    comment.documentation = Some(parse_docstring(&comment.text));
    Some(comment)
}

fn strip_string_quotes(raw: &str) -> String {
    let raw = raw.trim();
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if raw.len() >= quote.len() * 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return raw[quote.len()..raw.len() - quote.len()].trim().to_string();
        }
    }
    raw.to_string()
}

/// Parse a `/** ... */` block into its structured form. Malformed blocks
/// produce a partial structure, never an error.
pub fn parse_jsdoc(text: &str) -> Documentation {
    let body = text
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");
    let lines: Vec<String> = body
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim().to_string())
        .collect();

    let mut doc = Documentation::default();
    let mut description_lines = Vec::new();
    let mut current_tag: Option<(String, Vec<String>)> = None;

    let flush = |doc: &mut Documentation, tag: Option<(String, Vec<String>)>| {
        let Some((tag, lines)) = tag else { return };
        let value = lines.join("\n").trim().to_string();
        match tag.as_str() {
            "param" | "arg" | "argument" => {
                // `@param {type} name description` or `@param name description`
                let mut rest = value.as_str();
                if let Some(close) = rest.strip_prefix('{').and_then(|r| r.find('}')) {
                    rest = rest[close + 2..].trim_start();
                }
                let mut parts = rest.splitn(2, char::is_whitespace);
                let name = parts.next().unwrap_or("").trim_start_matches('-');
                let description = parts.next().unwrap_or("").trim_start_matches('-').trim();
                if !name.is_empty() {
                    doc.params.push(DocParam {
                        name: name.to_string(),
                        description: description.to_string(),
                    });
                }
            }
            "returns" | "return" => doc.returns = Some(strip_type_brace(&value)),
            "throws" | "throw" | "exception" => doc.throws.push(strip_type_brace(&value)),
            "example" => doc.examples.push(value),
            other => {
                doc.tags.insert(other.to_string(), value);
            }
        }
    };

    for line in &lines {
        if let Some(rest) = line.strip_prefix('@') {
            flush(&mut doc, current_tag.take());
            let mut parts = rest.splitn(2, char::is_whitespace);
            let tag = parts.next().unwrap_or("").to_string();
            let value = parts.next().unwrap_or("").to_string();
            current_tag = Some((tag, vec![value]));
        } else if let Some((_, values)) = current_tag.as_mut() {
            values.push(line.clone());
        } else {
            description_lines.push(line.clone());
        }
    }
    flush(&mut doc, current_tag.take());

    doc.description = description_lines.join("\n").trim().to_string();
    doc
}

fn strip_type_brace(value: &str) -> String {
    let value = value.trim();
    if let Some(close) = value.strip_prefix('{').and_then(|r| r.find('}')) {
        value[close + 2..].trim().to_string()
    } else {
        value.to_string()
    }
}

/// Parse a docstring: first paragraph is the description; `:param name:`,
/// `:returns:` and `:raises X:` directives fill the structured fields.
pub fn parse_docstring(text: &str) -> Documentation {
    let mut doc = Documentation::default();
    let mut description_lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(":param ") {
            if let Some((name, description)) = rest.split_once(':') {
                doc.params.push(DocParam {
                    name: name.trim().to_string(),
                    description: description.trim().to_string(),
                });
                continue;
            }
        }
        if let Some(rest) = trimmed.strip_prefix(":returns:") {
            doc.returns = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(":return:") {
            doc.returns = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(":raises ") {
            doc.throws.push(rest.trim_end_matches(':').trim().to_string());
            continue;
        }
        description_lines.push(trimmed.to_string());
    }

    doc.description = description_lines.join("\n").trim().to_string();
    doc
}

/// Associate comments with the symbols they document: a comment that
/// immediately precedes a symbol (whitespace only between), or a docstring
/// inside the symbol's body. Sets the symbol's documentation text.
pub fn associate(comments: &mut [Comment], symbols: &mut [Symbol], source: &str) {
    for comment in comments.iter_mut() {
        // Docstrings attach to the tightest enclosing symbol.
        if comment.kind == CommentKind::Docstring {
            let target = symbols
                .iter_mut()
                .filter(|s| s.span().encloses(&comment.span))
                .min_by_key(|s| s.span().byte_len());
            if let Some(symbol) = target {
                comment.associated_symbol = Some(symbol.name().to_string());
                symbol.set_documentation(comment.text.clone());
            }
            continue;
        }

        let gap_start = comment.span.end_byte;
        let target = symbols
            .iter_mut()
            .filter(|s| {
                let start = s.span().start_byte;
                start >= gap_start
                    && source.get(gap_start..start).is_some_and(is_association_gap)
            })
            .min_by_key(|s| s.span().start_byte);
        if let Some(symbol) = target {
            comment.associated_symbol = Some(symbol.name().to_string());
            symbol.set_documentation(clean_comment_text(&comment.text));
        }
    }
}

/// The text between a comment and a symbol may contain only whitespace,
/// declaration modifiers, or decorators for the two to associate.
fn is_association_gap(gap: &str) -> bool {
    gap.split_whitespace()
        .all(|word| matches!(word, "export" | "default" | "declare" | "abstract") || word.starts_with('@'))
}

/// Strip comment markers so documentation text reads as prose.
pub fn clean_comment_text(text: &str) -> String {
    let text = text.trim();
    if text.starts_with("/*") {
        text.trim_start_matches("/**")
            .trim_start_matches("/*")
            .trim_end_matches("*/")
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches("//")
                    .trim_start_matches('#')
                    .trim()
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}
