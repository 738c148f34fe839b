//! Macro and synonym tables.
//!
//! Tables are immutable once built. Updating them means building a new table
//! and a new parser around it, then swapping the parser in
//! [`SharedParser`](super::SharedParser).

use crate::console::ConsoleKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Every macro name starts with this character.
pub const MACRO_START: char = '#';

/// A named shorthand, e.g. `#jump` → `_up a500ms -up`.
///
/// Dynamic macros carry their argument placeholders in the name:
/// `#mash(*)` with the expansion `[<0>34ms #34ms]*20`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    pub expansion: String,
}

impl Macro {
    pub fn new(name: impl Into<String>, expansion: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expansion: expansion.into(),
        }
    }
}

/// A console-scoped literal replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    pub console: ConsoleKind,
    pub name: String,
    pub value: String,
}

impl Synonym {
    pub fn new(console: ConsoleKind, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            console,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Groups names by `key`, each bucket sorted longest name first.
fn build_index<'a>(
    names: impl Iterator<Item = &'a String>,
    key: impl Fn(&str) -> Option<char>,
) -> HashMap<char, Vec<String>> {
    let mut index: HashMap<char, Vec<String>> = HashMap::new();
    for name in names {
        if let Some(c) = key(name.as_str()) {
            index.entry(c).or_default().push(name.clone());
        }
    }
    for bucket in index.values_mut() {
        bucket.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    }
    index
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, String>,
    // Keyed by the first character after '#'.
    index: HashMap<char, Vec<String>>,
}

impl MacroTable {
    pub fn new(macros: impl IntoIterator<Item = Macro>) -> Self {
        let mut table = HashMap::new();

        for m in macros {
            let name = m.name.trim().to_lowercase();
            if !name.starts_with(MACRO_START) || name.chars().count() < 2 {
                warn!("Skipping macro \"{}\": name must start with '#'", m.name);
                continue;
            }
            if table.insert(name.clone(), m.expansion).is_some() {
                warn!("Macro \"{}\" defined twice, keeping the last one", name);
            }
        }

        let index = build_index(table.keys(), |name| name.chars().nth(1));
        debug!("Built macro table with {} macros", table.len());

        Self {
            macros: table,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    /// The longest macro whose name is a prefix of `token`.
    ///
    /// `token` starts with `#`; the lookup only scans the bucket for the
    /// character that follows it.
    pub fn longest_prefix(&self, token: &str) -> Option<(&str, &str)> {
        let key = token.chars().nth(1)?;
        let bucket = self.index.get(&key)?;

        bucket
            .iter()
            .find(|name| token.starts_with(name.as_str()))
            .and_then(|name| self.macros.get_key_value(name))
            .map(|(name, expansion)| (name.as_str(), expansion.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    synonyms: HashMap<ConsoleKind, HashMap<String, String>>,
}

impl SynonymTable {
    pub fn new(synonyms: impl IntoIterator<Item = Synonym>) -> Self {
        let mut table: HashMap<ConsoleKind, HashMap<String, String>> = HashMap::new();

        for synonym in synonyms {
            let name = synonym.name.trim().to_lowercase();
            if name.is_empty() {
                warn!("Skipping synonym with an empty name for {}", synonym.console);
                continue;
            }
            table
                .entry(synonym.console)
                .or_default()
                .insert(name, synonym.value);
        }

        Self { synonyms: table }
    }

    /// The synonyms that apply to one console.
    pub fn for_console(&self, console: ConsoleKind) -> ConsoleSynonyms {
        let synonyms = self.synonyms.get(&console).cloned().unwrap_or_default();
        let index = build_index(synonyms.keys(), |name| name.chars().next());

        ConsoleSynonyms { synonyms, index }
    }
}

/// One console's synonyms, indexed by first character.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSynonyms {
    synonyms: HashMap<String, String>,
    index: HashMap<char, Vec<String>>,
}

impl ConsoleSynonyms {
    pub fn is_empty(&self) -> bool {
        self.synonyms.is_empty()
    }

    /// Synonyms starting with `c`, longest first.
    pub fn starting_with(&self, c: char) -> impl Iterator<Item = (&str, &str)> {
        self.index
            .get(&c)
            .into_iter()
            .flatten()
            .filter_map(|name| self.synonyms.get_key_value(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}
