// ABOUTME: The header cache mapping column indices to their current display names.
// ABOUTME: Tracks the primary key column and relabels source predicates with user-chosen names.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Default cap on the number of header columns read from the source.
pub const DEFAULT_MAX_COLUMNS: usize = 200;

/// Placeholder name for a column whose header cell is blank or unreadable.
pub fn placeholder_name(column_index: usize) -> String {
    format!("Column {}", column_index)
}

/// Column index to display name, contiguous from 1, plus the primary key selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCache {
    names: BTreeMap<usize, String>,
    primary_key_column: usize,
    /// Indices whose name was chosen by the user rather than read from the source.
    #[serde(default)]
    renamed: BTreeSet<usize>,
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self {
            names: BTreeMap::new(),
            primary_key_column: 1,
            renamed: BTreeSet::new(),
        }
    }
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from raw header cells, filling gaps and blanks with
    /// placeholders and dropping anything beyond `max_columns`.
    pub fn from_headers(raw: &BTreeMap<usize, String>, max_columns: usize) -> Self {
        let mut cache = Self::new();
        cache.replace(raw, max_columns);
        cache
    }

    /// Re-derive names from the source, as after a reconnect. User renames
    /// and the primary key selection survive.
    pub fn replace(&mut self, raw: &BTreeMap<usize, String>, max_columns: usize) {
        let mut previous = std::mem::take(&mut self.names);
        let last = raw
            .keys()
            .copied()
            .filter(|idx| *idx >= 1)
            .max()
            .unwrap_or(0)
            .min(max_columns);
        self.renamed.retain(|idx| *idx <= last);
        for idx in 1..=last {
            if self.renamed.contains(&idx) {
                if let Some(kept) = previous.remove(&idx) {
                    self.names.insert(idx, kept);
                    continue;
                }
            }
            let name = raw
                .get(&idx)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| placeholder_name(idx));
            self.names.insert(idx, name);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, column_index: usize) -> Option<&str> {
        self.names.get(&column_index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(|(idx, name)| (*idx, name.as_str()))
    }

    pub fn names(&self) -> &BTreeMap<usize, String> {
        &self.names
    }

    /// Display name for a predicate reported by the source. The cached name
    /// wins when the index is known so renamed columns keep their new label.
    pub fn label(&self, column_index: usize, source_name: &str) -> String {
        match self.names.get(&column_index) {
            Some(name) if column_index > 0 => name.clone(),
            _ => source_name.to_string(),
        }
    }

    /// Rename every entry equal to `original`. Returns the number of entries changed.
    pub fn rename(&mut self, original: &str, new_name: &str) -> usize {
        let mut changed = 0;
        for (idx, name) in self.names.iter_mut() {
            if name == original {
                *name = new_name.to_string();
                self.renamed.insert(*idx);
                changed += 1;
            }
        }
        changed
    }

    pub fn primary_key_column(&self) -> usize {
        self.primary_key_column
    }

    pub fn primary_key_name(&self) -> String {
        self.get(self.primary_key_column)
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_name(self.primary_key_column))
    }

    /// Select the primary key column. Returns false if the index is not a known column.
    pub fn set_primary_key(&mut self, column_index: usize) -> bool {
        if !self.names.contains_key(&column_index) {
            return false;
        }
        self.primary_key_column = column_index;
        true
    }

    pub fn rename_primary_key(&mut self, new_name: &str) {
        self.names
            .insert(self.primary_key_column, new_name.to_string());
        self.renamed.insert(self.primary_key_column);
    }
}
