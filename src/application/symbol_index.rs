use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use serde::Serialize;
use tracing::debug;

use crate::domain::{AstDocument, SymbolKind};

const KGRAM_LEN: usize = 3;

/// One location a symbol name resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub name: String,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SymbolIndexStats {
    pub num_symbols: usize,
    pub num_unique_names: usize,
    pub num_kgrams: usize,
}

#[derive(Default)]
struct Inner {
    by_name: BTreeMap<String, Vec<SymbolEntry>>,
    names_by_file: HashMap<String, Vec<String>>,
    kgrams: HashMap<String, HashSet<String>>,
}

/// In-memory symbol name lookup: exact, prefix, substring and
/// edit-distance matches. Substring and fuzzy queries are accelerated by a
/// k-gram inverted index over lowercased names. Reads may run concurrently;
/// writes serialize through the indexer.
pub struct SymbolIndex {
    inner: RwLock<Inner>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn add(&self, file_path: &str, doc: &AstDocument) {
        let mut inner = self.inner.write().expect("symbol index lock");
        Self::remove_locked(&mut inner, file_path);

        let mut names = Vec::new();
        for symbol in doc.all_symbols() {
            let entry = SymbolEntry {
                name: symbol.name.clone(),
                file_path: file_path.to_string(),
                line: symbol.span.start_line,
                column: symbol.span.start_column,
                kind: symbol.kind,
            };
            for gram in kgrams_of(&symbol.name) {
                inner
                    .kgrams
                    .entry(gram)
                    .or_default()
                    .insert(symbol.name.clone());
            }
            inner
                .by_name
                .entry(symbol.name.clone())
                .or_default()
                .push(entry);
            names.push(symbol.name.clone());
        }
        inner.names_by_file.insert(file_path.to_string(), names);
        debug!("Symbol index updated for {}", file_path);
    }

    pub fn remove(&self, file_path: &str) {
        let mut inner = self.inner.write().expect("symbol index lock");
        Self::remove_locked(&mut inner, file_path);
    }

    fn remove_locked(inner: &mut Inner, file_path: &str) {
        let Some(names) = inner.names_by_file.remove(file_path) else {
            return;
        };
        for name in names {
            let now_empty = match inner.by_name.get_mut(&name) {
                Some(entries) => {
                    entries.retain(|e| e.file_path != file_path);
                    entries.is_empty()
                }
                None => false,
            };
            if now_empty {
                inner.by_name.remove(&name);
                for gram in kgrams_of(&name) {
                    if let Some(set) = inner.kgrams.get_mut(&gram) {
                        set.remove(&name);
                        if set.is_empty() {
                            inner.kgrams.remove(&gram);
                        }
                    }
                }
            }
        }
    }

    pub fn exact(&self, name: &str) -> Vec<SymbolEntry> {
        let inner = self.inner.read().expect("symbol index lock");
        inner.by_name.get(name).cloned().unwrap_or_default()
    }

    pub fn prefix(&self, prefix: &str, limit: usize) -> Vec<SymbolEntry> {
        let inner = self.inner.read().expect("symbol index lock");
        let mut entries = Vec::new();
        for (name, matches) in inner.by_name.range(prefix.to_string()..) {
            if !name.starts_with(prefix) {
                break;
            }
            for entry in matches {
                if entries.len() >= limit {
                    return entries;
                }
                entries.push(entry.clone());
            }
        }
        entries
    }

    pub fn substring(&self, needle: &str, limit: usize) -> Vec<SymbolEntry> {
        let inner = self.inner.read().expect("symbol index lock");
        let needle_lower = needle.to_lowercase();

        let candidates: Vec<String> = if needle_lower.len() >= KGRAM_LEN {
            // All names sharing every k-gram of the needle.
            let grams = kgrams_of(&needle_lower);
            let mut sets = grams.iter().filter_map(|g| inner.kgrams.get(g));
            let Some(first) = sets.next() else {
                return Vec::new();
            };
            let mut intersection: HashSet<String> = first.clone();
            for set in sets {
                intersection.retain(|name| set.contains(name));
            }
            intersection.into_iter().collect()
        } else {
            inner.by_name.keys().cloned().collect()
        };

        let mut names: Vec<String> = candidates
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle_lower))
            .collect();
        names.sort();

        let mut entries = Vec::new();
        for name in names {
            if let Some(matches) = inner.by_name.get(&name) {
                for entry in matches {
                    if entries.len() >= limit {
                        return entries;
                    }
                    entries.push(entry.clone());
                }
            }
        }
        entries
    }

    pub fn fuzzy(&self, query: &str, max_distance: usize, limit: usize) -> Vec<SymbolEntry> {
        let inner = self.inner.read().expect("symbol index lock");
        let query_lower = query.to_lowercase();

        // Candidate pool: names sharing at least one k-gram with the query,
        // falling back to all names for very short queries.
        let candidates: HashSet<String> = if query_lower.len() >= KGRAM_LEN {
            kgrams_of(&query_lower)
                .into_iter()
                .filter_map(|g| inner.kgrams.get(&g))
                .flat_map(|set| set.iter().cloned())
                .collect()
        } else {
            inner.by_name.keys().cloned().collect()
        };

        let mut scored: Vec<(usize, String)> = candidates
            .into_iter()
            .filter_map(|name| {
                edit_distance_within(&name.to_lowercase(), &query_lower, max_distance)
                    .map(|d| (d, name))
            })
            .collect();
        scored.sort();

        let mut entries = Vec::new();
        for (_, name) in scored {
            if let Some(matches) = inner.by_name.get(&name) {
                for entry in matches {
                    if entries.len() >= limit {
                        return entries;
                    }
                    entries.push(entry.clone());
                }
            }
        }
        entries
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("symbol index lock");
        *inner = Inner::default();
    }

    pub fn stats(&self) -> SymbolIndexStats {
        let inner = self.inner.read().expect("symbol index lock");
        SymbolIndexStats {
            num_symbols: inner.by_name.values().map(Vec::len).sum(),
            num_unique_names: inner.by_name.len(),
            num_kgrams: inner.kgrams.len(),
        }
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased k-grams of a name; names shorter than k produce one gram.
fn kgrams_of(name: &str) -> Vec<String> {
    let lower: Vec<char> = name.to_lowercase().chars().collect();
    if lower.len() < KGRAM_LEN {
        return vec![lower.iter().collect()];
    }
    lower
        .windows(KGRAM_LEN)
        .map(|w| w.iter().collect())
        .collect()
}

/// Levenshtein distance, bailing out early once every value in a row
/// exceeds the budget. Returns `None` when the distance is above `max`.
fn edit_distance_within(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current.push(substitution.min(previous[j + 1] + 1).min(current[j] + 1));
        }
        if current.iter().min().is_some_and(|&m| m > max) {
            return None;
        }
        previous = current;
    }

    let distance = previous[b.len()];
    (distance <= max).then_some(distance)
}
