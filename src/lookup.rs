use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, RemapError, RemapResult};

const INDEX_VERSION: u32 = 1;
pub const KEY_SEPARATOR: &str = "_";

/// Joins a column (or sender code) and a raw value into a lookup key.
pub fn composite_key(column: &str, value: &str) -> String {
    let mut key = String::with_capacity(column.len() + KEY_SEPARATOR.len() + value.len());
    key.push_str(column);
    key.push_str(KEY_SEPARATOR);
    key.push_str(value);
    key
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub composite_key: String,
    pub average_value: String,
}

impl MappingEntry {
    pub fn new(sender: &str, category: &str, average: impl Into<String>) -> Self {
        MappingEntry {
            composite_key: composite_key(sender, category),
            average_value: average.into(),
        }
    }
}

/// Immutable composite-key to average lookup, optionally persisted with
/// `bincode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupIndex {
    version: u32,
    entries: HashMap<String, String>,
    overwritten: usize,
}

impl LookupIndex {
    /// Builds the index; a later entry for the same key replaces the earlier one.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MappingEntry>,
    {
        let mut map = HashMap::new();
        let mut overwritten = 0usize;
        for entry in entries {
            if map
                .insert(entry.composite_key, entry.average_value)
                .is_some()
            {
                overwritten += 1;
            }
        }
        LookupIndex {
            version: INDEX_VERSION,
            entries: map,
            overwritten,
        }
    }

    /// Exact-match probe. A stored blank average never counts as a hit.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of source rows whose key had already been seen.
    pub fn overwritten_keys(&self) -> usize {
        self.overwritten
    }

    pub fn save(&self, path: &Path) -> RemapResult<()> {
        let file =
            File::create(path).context_with(|| format!("Creating lookup index {path:?}"))?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|err| {
                RemapError::io(
                    format!("Writing lookup index {path:?}"),
                    io::Error::other(err.to_string()),
                )
            })?;
        writer
            .flush()
            .context_with(|| format!("Flushing lookup index {path:?}"))
    }

    pub fn load(path: &Path) -> RemapResult<Self> {
        let bytes = std::fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => {
                RemapError::configuration(format!("Lookup index {path:?} not found"))
            }
            _ => RemapError::io(format!("Opening lookup index {path:?}"), err),
        })?;
        let (index, _): (LookupIndex, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(
                |err| {
                    RemapError::configuration(format!(
                        "Lookup index {path:?} is unreadable: {err}"
                    ))
                },
            )?;
        if index.version != INDEX_VERSION {
            return Err(RemapError::configuration(format!(
                "Unsupported lookup index version {} in {path:?} (expected {INDEX_VERSION})",
                index.version
            )));
        }
        Ok(index)
    }
}
