//! Cure / remediation lookup table
//!
//! `cure.json` maps disease labels to remedy text. Keys in the source data
//! are inconsistently cased and spaced, so both the table keys and lookups
//! are normalized (lowercased, whitespace collapsed). A miss is not an
//! error; callers get the fixed fallback string.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Returned when a label has no cure entry.
pub const CURE_FALLBACK: &str =
    "No cure information available. Please consult a plant expert.";

/// Collapse whitespace runs and lowercase, matching the table key form.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remedy text keyed by normalized label.
#[derive(Debug, Clone, Default)]
pub struct CureTable {
    entries: HashMap<String, String>,
}

impl CureTable {
    /// Parse the cure table from a JSON object of label → remedy.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(text)
            .map_err(|e| Error::LabelParse(format!("cure table is not a JSON object: {e}")))?;
        let entries = raw
            .into_iter()
            .map(|(label, cure)| (normalize_label(&label), cure))
            .collect();
        Ok(Self { entries })
    }

    /// Build a table from explicit entries (used by tests). Keys are
    /// normalized here as well.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let entries = entries
            .into_iter()
            .map(|(label, cure)| (normalize_label(&label), cure))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact match on the normalized label; `None` means "use the fallback".
    pub fn lookup(&self, label: &str) -> Option<&str> {
        self.entries.get(&normalize_label(label)).map(String::as_str)
    }

    /// Lookup with the fallback applied.
    pub fn lookup_or_fallback(&self, label: &str) -> &str {
        self.lookup(label).unwrap_or(CURE_FALLBACK)
    }
}
