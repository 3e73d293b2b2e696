//! Static ticker → company name table.
//!
//! Loaded once at startup from a JSON object (`{"SH600519": "贵州茅台", ...}`)
//! and shared read-only behind an `Arc`. Keys may be in any ticker form; the
//! lookup tries the canonicalized input, then its fixed form, then its bare
//! code.

use std::collections::HashMap;
use std::path::Path;

use bridge_common::{Error, Result};

use crate::symbol::{bare_code, classify_exchange, to_fixed_form};

/// Immutable symbol-to-name map.
#[derive(Debug, Clone, Default)]
pub struct SymbolNameMap {
    entries: HashMap<String, String>,
}

impl SymbolNameMap {
    /// Load the map from a JSON file.
    ///
    /// A missing file yields an empty map so the service can still start.
    /// A file that exists but cannot be parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Name map not found, names will not be overridden");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e).with_context(format!("Failed to read name map {}", path.display()))
        })?;
        let entries = parse_entries(&content)
            .map_err(|e| e.with_context(format!("Failed to parse name map {}", path.display())))?;

        tracing::info!(path = %path.display(), entries = entries.len(), "Loaded name map");
        Ok(Self::from_map(entries))
    }

    /// Build from an in-memory table. Keys are upper-cased.
    pub fn from_map(entries: HashMap<String, String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
            .collect();
        Self { entries }
    }

    /// Resolve a display name for any ticker form.
    pub fn lookup(&self, symbol: &str) -> Option<&str> {
        let raw = symbol.trim().to_ascii_uppercase();
        if let Some(name) = self.entries.get(&raw) {
            return Some(name);
        }

        let fixed = to_fixed_form(&raw);
        if let Some(name) = self.entries.get(&fixed) {
            return Some(name);
        }

        // A bare key names whichever exchange its digits imply, so it only
        // answers for that exchange (`SH000001` is not `000001`).
        bare_code(&fixed)
            .filter(|code| classify_exchange(code) == classify_exchange(&fixed))
            .and_then(|code| self.entries.get(&code).map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A JSON object whose values are all strings.
fn parse_entries(content: &str) -> Result<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let serde_json::Value::Object(object) = value else {
        return Err(Error::NameMap("expected a JSON object of ticker to name".into()));
    };

    object
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(name) => Ok((key, name)),
            other => Err(Error::NameMap(format!(
                "name for {} must be a string, got {}",
                key, other
            ))),
        })
        .collect()
}
