use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::domain::{IndexError, Language};

/// Maps language tags to loaded tree-sitter grammars. Grammars are loaded
/// once and cached for the lifetime of the process.
pub struct GrammarRegistry {
    loaded: Mutex<HashMap<Language, tree_sitter::Language>>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self {
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Classify a path into a language tag.
    pub fn detect(path: &std::path::Path) -> Language {
        Language::from_path(path)
    }

    /// Load (or fetch from cache) the grammar for a tag. Tags without a
    /// grammar fail with `UnsupportedLanguage`.
    pub fn load(&self, language: Language) -> Result<tree_sitter::Language, IndexError> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| IndexError::internal("grammar cache lock poisoned"))?;

        if let Some(grammar) = loaded.get(&language) {
            return Ok(grammar.clone());
        }

        let grammar: tree_sitter::Language = match language {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            other => {
                return Err(IndexError::UnsupportedLanguage(other.as_str().to_string()));
            }
        };

        debug!("Loaded grammar for {}", language);
        loaded.insert(language, grammar.clone());
        Ok(grammar)
    }

    pub fn supports(&self, language: Language) -> bool {
        language.has_grammar()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}
