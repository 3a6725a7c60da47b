use std::collections::HashMap;

use tree_sitter::{Node, Tree};

use crate::connector::parser::syntax::SyntaxParser;
use crate::domain::{CallKind, CallSite, ChainContext, Language, DYNAMIC_CALLEE};

const RECEIVER_TRUNCATE: usize = 80;

/// Extract every call expression as one record. Computed and otherwise
/// unresolvable callees are recorded as `<dynamic>`, never dropped.
pub fn extract_calls(tree: &Tree, source: &str, language: Language) -> Vec<CallSite> {
    let mut raw = Vec::new();
    collect(tree.root_node(), source, language, &mut raw);
    link_chains(raw)
}

struct RawCall {
    node_id: usize,
    /// Node id of the call this one directly continues (its receiver call).
    inner_id: Option<usize>,
    site: CallSite,
}

fn collect(node: Node, source: &str, language: Language, out: &mut Vec<RawCall>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match (language, child.kind()) {
            (Language::Python, "call") => {
                if let Some(raw) = python_call(&child, source) {
                    out.push(raw);
                }
            }
            (Language::Python, _) => {}
            (_, "call_expression") => {
                if let Some(raw) = ecma_call(&child, source) {
                    out.push(raw);
                }
            }
            (_, "new_expression") => {
                if let Some(raw) = ecma_new(&child, source) {
                    out.push(raw);
                }
            }
            _ => {}
        }
        collect(child, source, language, out);
    }
}

fn argument_count(node: &Node) -> usize {
    node.child_by_field_name("arguments")
        .map(|args| args.named_child_count())
        .unwrap_or(0)
}

fn receiver_text(node: &Node, source: &str) -> String {
    let text = source[node.byte_range()].trim();
    if text.chars().count() > RECEIVER_TRUNCATE {
        text.chars().take(RECEIVER_TRUNCATE).collect()
    } else {
        text.to_string()
    }
}

fn ecma_call(node: &Node, source: &str) -> Option<RawCall> {
    let function = node.child_by_field_name("function")?;
    let span = SyntaxParser::span_of(node);
    let args = argument_count(node);

    let (site, inner_id) = match function.kind() {
        "identifier" => (
            CallSite::new(&source[function.byte_range()], CallKind::Function, args, span),
            None,
        ),
        "super" => (CallSite::new("super", CallKind::Super, args, span), None),
        "import" => (
            CallSite::new("import", CallKind::Function, args, span),
            None,
        ),
        "member_expression" => {
            let property = function.child_by_field_name("property");
            let object = function.child_by_field_name("object");
            let callee = property
                .filter(|p| p.kind() == "property_identifier")
                .map(|p| source[p.byte_range()].to_string())
                .unwrap_or_else(|| DYNAMIC_CALLEE.to_string());
            let kind = if callee == DYNAMIC_CALLEE {
                CallKind::Dynamic
            } else {
                CallKind::Method
            };
            let mut site = CallSite::new(callee, kind, args, span);
            let mut inner = None;
            if let Some(object) = object {
                site = site.with_receiver(receiver_text(&object, source));
                inner = chained_call_id(&object);
            }
            (site, inner)
        }
        // obj[key]() and any other computed callee
        "subscript_expression" => {
            let mut site = CallSite::new(DYNAMIC_CALLEE, CallKind::Dynamic, args, span);
            if let Some(object) = function.child_by_field_name("object") {
                site = site.with_receiver(receiver_text(&object, source));
            }
            (site, None)
        }
        _ => (
            CallSite::new(DYNAMIC_CALLEE, CallKind::Dynamic, args, span),
            None,
        ),
    };

    Some(RawCall {
        node_id: node.id(),
        inner_id,
        site,
    })
}

fn ecma_new(node: &Node, source: &str) -> Option<RawCall> {
    let constructor = node.child_by_field_name("constructor")?;
    let span = SyntaxParser::span_of(node);
    let callee = match constructor.kind() {
        "identifier" | "member_expression" => source[constructor.byte_range()].to_string(),
        _ => DYNAMIC_CALLEE.to_string(),
    };
    Some(RawCall {
        node_id: node.id(),
        inner_id: None,
        site: CallSite::new(callee, CallKind::Constructor, argument_count(node), span),
    })
}

fn python_call(node: &Node, source: &str) -> Option<RawCall> {
    let function = node.child_by_field_name("function")?;
    let span = SyntaxParser::span_of(node);
    let args = argument_count(node);

    let (site, inner_id) = match function.kind() {
        "identifier" => {
            let name = &source[function.byte_range()];
            let kind = if name == "super" {
                CallKind::Super
            } else {
                CallKind::Function
            };
            (CallSite::new(name, kind, args, span), None)
        }
        "attribute" => {
            let attr = function.child_by_field_name("attribute");
            let object = function.child_by_field_name("object");
            let callee = attr
                .map(|a| source[a.byte_range()].to_string())
                .unwrap_or_else(|| DYNAMIC_CALLEE.to_string());
            let kind = if callee == DYNAMIC_CALLEE {
                CallKind::Dynamic
            } else {
                CallKind::Method
            };
            let mut site = CallSite::new(callee, kind, args, span);
            let mut inner = None;
            if let Some(object) = object {
                site = site.with_receiver(receiver_text(&object, source));
                inner = chained_call_id(&object);
            }
            (site, inner)
        }
        _ => (
            CallSite::new(DYNAMIC_CALLEE, CallKind::Dynamic, args, span),
            None,
        ),
    };

    Some(RawCall {
        node_id: node.id(),
        inner_id,
        site,
    })
}

/// When a method call's receiver is itself a call, the two form a chain.
fn chained_call_id(object: &Node) -> Option<usize> {
    match object.kind() {
        "call_expression" | "call" => Some(object.id()),
        _ => None,
    }
}

/// Assign chain contexts: positions are 0-based from the innermost call
/// outward, with neighbor callee names attached.
fn link_chains(raw: Vec<RawCall>) -> Vec<CallSite> {
    // Map call node id -> index, and inner id -> outer index.
    let index_by_id: HashMap<usize, usize> =
        raw.iter().enumerate().map(|(i, r)| (r.node_id, i)).collect();
    let mut outer_of: HashMap<usize, usize> = HashMap::new();
    for (i, r) in raw.iter().enumerate() {
        if let Some(inner_id) = r.inner_id {
            if let Some(&inner_idx) = index_by_id.get(&inner_id) {
                outer_of.insert(inner_idx, i);
            }
        }
    }

    let mut sites: Vec<CallSite> = raw.iter().map(|r| r.site.clone()).collect();

    // Chain heads are innermost calls that have an outer but no inner link.
    for (i, r) in raw.iter().enumerate() {
        let has_inner = r
            .inner_id
            .is_some_and(|id| index_by_id.contains_key(&id));
        if has_inner || !outer_of.contains_key(&i) {
            continue;
        }

        let mut chain = vec![i];
        let mut current = i;
        while let Some(&outer) = outer_of.get(&current) {
            chain.push(outer);
            current = outer;
        }
        if chain.len() < 2 {
            continue;
        }

        let names: Vec<String> = chain.iter().map(|&idx| sites[idx].callee.clone()).collect();
        for (position, &idx) in chain.iter().enumerate() {
            sites[idx].chain = Some(ChainContext {
                position,
                previous: position.checked_sub(1).map(|p| names[p].clone()),
                next: names.get(position + 1).cloned(),
            });
        }
    }

    sites.sort_by_key(|s| s.span.start_byte);
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::parser::{GrammarRegistry, SyntaxParser};

    fn calls_of(source: &str, language: Language) -> Vec<CallSite> {
        let registry = GrammarRegistry::new();
        let grammar = registry.load(language).unwrap();
        let tree = SyntaxParser::parse(source, &grammar, "test").unwrap();
        extract_calls(&tree, source, language)
    }

    #[test]
    fn test_ts_call_kinds() {
        let source = r#"
class Child extends Base {
  constructor() {
    super(1, 2);
    this.engine = new Engine("v8");
  }
}
run(42);
handlers[name](payload);
"#;
        let calls = calls_of(source, Language::TypeScript);

        let sup = calls.iter().find(|c| c.kind == CallKind::Super).unwrap();
        assert_eq!(sup.argument_count, 2);

        let ctor = calls
            .iter()
            .find(|c| c.kind == CallKind::Constructor)
            .unwrap();
        assert_eq!(ctor.callee, "Engine");
        assert_eq!(ctor.argument_count, 1);

        assert!(calls
            .iter()
            .any(|c| c.callee == "run" && c.kind == CallKind::Function));

        let dynamic = calls.iter().find(|c| c.kind == CallKind::Dynamic).unwrap();
        assert_eq!(dynamic.callee, DYNAMIC_CALLEE);
        assert_eq!(dynamic.argument_count, 1);
    }

    #[test]
    fn test_method_receiver() {
        let calls = calls_of("client.fetch(url);\n", Language::JavaScript);
        let fetch = calls.iter().find(|c| c.callee == "fetch").unwrap();
        assert_eq!(fetch.kind, CallKind::Method);
        assert_eq!(fetch.receiver.as_deref(), Some("client"));
    }

    #[test]
    fn test_chain_positions_and_neighbors() {
        let calls = calls_of(
            "const out = items.filter(f).map(g).join(\",\");\n",
            Language::JavaScript,
        );

        let filter = calls.iter().find(|c| c.callee == "filter").unwrap();
        let map = calls.iter().find(|c| c.callee == "map").unwrap();
        let join = calls.iter().find(|c| c.callee == "join").unwrap();

        let filter_chain = filter.chain.as_ref().unwrap();
        assert_eq!(filter_chain.position, 0);
        assert_eq!(filter_chain.previous, None);
        assert_eq!(filter_chain.next.as_deref(), Some("map"));

        let map_chain = map.chain.as_ref().unwrap();
        assert_eq!(map_chain.position, 1);
        assert_eq!(map_chain.previous.as_deref(), Some("filter"));
        assert_eq!(map_chain.next.as_deref(), Some("join"));

        let join_chain = join.chain.as_ref().unwrap();
        assert_eq!(join_chain.position, 2);
        assert_eq!(join_chain.next, None);
    }

    #[test]
    fn test_unchained_call_has_no_chain() {
        let calls = calls_of("solo();\n", Language::JavaScript);
        assert!(calls[0].chain.is_none());
    }

    #[test]
    fn test_python_calls() {
        let source = r#"
class Child(Base):
    def __init__(self):
        super().__init__()

result = process(data)
obj.method(1, 2, 3)
"#;
        let calls = calls_of(source, Language::Python);

        assert!(calls
            .iter()
            .any(|c| c.callee == "super" && c.kind == CallKind::Super));
        assert!(calls
            .iter()
            .any(|c| c.callee == "process" && c.kind == CallKind::Function));
        let method = calls.iter().find(|c| c.callee == "method").unwrap();
        assert_eq!(method.kind, CallKind::Method);
        assert_eq!(method.argument_count, 3);
    }
}
