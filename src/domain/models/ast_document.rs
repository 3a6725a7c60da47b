use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CallSite, Export, Import, ParsedFile, Span, SymbolKind, SymbolMetadata};

/// One symbol entry inside an [`AstDocument`], keyed by qualified name in
/// its kind group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstSymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub parents: Vec<String>,
    pub signature: Option<String>,
    pub documentation: Option<String>,
    pub metadata: SymbolMetadata,
    pub hash: String,
}

/// Per-file JSON document mirroring the parse result, grouped by symbol
/// kind. Persisted under the state directory and used by the search service
/// to resolve anchors and call relationships without re-parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstDocument {
    pub path: String,
    pub language: String,
    pub file_hash: String,
    pub functions: BTreeMap<String, AstSymbolEntry>,
    pub classes: BTreeMap<String, AstSymbolEntry>,
    pub interfaces: BTreeMap<String, AstSymbolEntry>,
    pub type_aliases: BTreeMap<String, AstSymbolEntry>,
    pub enums: BTreeMap<String, AstSymbolEntry>,
    pub constants: BTreeMap<String, AstSymbolEntry>,
    /// Variables, properties, modules and namespaces that do not fit the
    /// groups above.
    pub components: BTreeMap<String, AstSymbolEntry>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub calls: Vec<CallSite>,
}

impl AstDocument {
    pub fn from_parsed(parsed: &ParsedFile) -> Self {
        let mut doc = AstDocument {
            path: parsed.path().to_string(),
            language: parsed.language().as_str().to_string(),
            file_hash: parsed.file_hash().to_string(),
            imports: parsed.imports().to_vec(),
            exports: parsed.exports().to_vec(),
            calls: parsed.calls().to_vec(),
            ..Default::default()
        };

        for symbol in parsed.symbols() {
            let entry = AstSymbolEntry {
                name: symbol.name().to_string(),
                kind: symbol.kind(),
                span: *symbol.span(),
                parents: symbol.parents().to_vec(),
                signature: symbol.signature().map(String::from),
                documentation: symbol.documentation().map(String::from),
                metadata: symbol.metadata().clone(),
                hash: symbol.hash().to_string(),
            };
            let key = symbol.qualified_name();
            let group = match symbol.kind() {
                SymbolKind::Function | SymbolKind::Method => &mut doc.functions,
                SymbolKind::Class => &mut doc.classes,
                SymbolKind::Interface => &mut doc.interfaces,
                SymbolKind::Type => &mut doc.type_aliases,
                SymbolKind::Enum => &mut doc.enums,
                SymbolKind::Constant => &mut doc.constants,
                _ => &mut doc.components,
            };
            group.insert(key, entry);
        }

        doc
    }

    /// All symbol entries across every group.
    pub fn all_symbols(&self) -> impl Iterator<Item = &AstSymbolEntry> {
        self.functions
            .values()
            .chain(self.classes.values())
            .chain(self.interfaces.values())
            .chain(self.type_aliases.values())
            .chain(self.enums.values())
            .chain(self.constants.values())
            .chain(self.components.values())
    }

    pub fn symbol_count(&self) -> usize {
        self.all_symbols().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Language, Symbol};

    #[test]
    fn test_grouping_by_kind() {
        let mut func = Symbol::new("run", SymbolKind::Function, Span::default());
        func.set_hash("aaaaaaaaaaaaaaaa");
        let mut class = Symbol::new("Engine", SymbolKind::Class, Span::default());
        class.set_hash("bbbbbbbbbbbbbbbb");
        let mut method = Symbol::new("start", SymbolKind::Method, Span::default());
        method.set_hash("cccccccccccccccc");
        let method = method.with_parents(vec!["Engine".to_string()]);

        let parsed = ParsedFile::new(
            "src/engine.ts".to_string(),
            Language::TypeScript,
            "0".repeat(64),
            vec![func, class, method],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        );

        let doc = AstDocument::from_parsed(&parsed);
        assert_eq!(doc.symbol_count(), 3);
        assert!(doc.functions.contains_key("run"));
        assert!(doc.functions.contains_key("Engine.start"));
        assert!(doc.classes.contains_key("Engine"));
    }
}
