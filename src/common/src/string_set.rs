//! Sets of topic names or prefixes supplied either inline or through a file.
//!
//! Every list-valued option (`allow_list`, `disallow_list`,
//! `hide_topic_prefixes`) accepts the same two spellings:
//!
//! - a comma-delimited list: `orders,payments,audit`
//! - a path to a file holding one entry per line
//!
//! The value is resolved exactly once while the configuration is turned into
//! detection settings; the detector itself only ever sees a plain set.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Raw list value as it appears in the configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringSetSource(String);

impl StringSetSource {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Resolve the source into a set of entries.
    ///
    /// A value naming an existing file is read line by line; blank lines and
    /// lines starting with `#` are ignored. Anything else is split on commas.
    pub fn resolve(&self) -> Result<BTreeSet<String>, ConfigError> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return Ok(BTreeSet::new());
        }

        let path = Path::new(raw);
        if path.is_file() {
            let contents =
                std::fs::read_to_string(path).map_err(|source| ConfigError::ListSource {
                    path: path.to_path_buf(),
                    source,
                })?;
            let entries = parse_lines(&contents);
            log::debug!("Loaded {} entries from {}", entries.len(), path.display());
            return Ok(entries);
        }

        Ok(parse_inline(raw))
    }
}

impl From<&str> for StringSetSource {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for StringSetSource {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

fn parse_lines(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn parse_inline(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
