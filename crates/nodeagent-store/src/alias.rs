//! # Alias Stores
//!
//! Map external identities (what the submitting agent calls a user or a
//! project) onto the identities the telescope knows. Forward lookups are
//! direct. Reverse lookups scan the values and are used on the way back
//! out, when an update from the telescope is relayed to the agent.
//!
//! Aliases need not be one to one. When several external names map onto
//! the same internal identity, reverse lookup returns the lexicographically
//! first of them so that repeated lookups always agree.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::property::PropertyMap;

/// Read-only external to internal identity map.
#[derive(Debug, Clone, Default)]
pub struct AliasStore {
    label: String,
    aliases: BTreeMap<String, String>,
}

impl AliasStore {
    /// Builds a store from `(external, internal)` pairs.
    ///
    /// `label` names the store in log output, for example `"user"`.
    pub fn new<I, K, V>(label: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self {
            label: label.to_string(),
            aliases: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };
        store.warn_ambiguous();
        store
    }

    /// Loads a store from a property file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`](crate::StoreError::Io) if the file cannot be read.
    pub fn load(label: &str, path: impl AsRef<Path>) -> Result<Self> {
        let props = PropertyMap::load(path)?;
        Ok(Self::new(label, props.into_inner()))
    }

    /// Internal identity for an external name.
    pub fn resolve(&self, external: &str) -> Option<&str> {
        self.aliases.get(external).map(String::as_str)
    }

    /// External name for an internal identity.
    pub fn reverse(&self, internal: &str) -> Option<&str> {
        // BTreeMap iterates in key order, so the first hit is the smallest key.
        self.aliases
            .iter()
            .find(|(_, v)| v.as_str() == internal)
            .map(|(k, _)| k.as_str())
    }

    /// Returns true if the external name has an alias.
    pub fn contains_key(&self, external: &str) -> bool {
        self.aliases.contains_key(external)
    }

    /// Returns true if some external name maps to this internal identity.
    pub fn contains_value(&self, internal: &str) -> bool {
        self.aliases.values().any(|v| v == internal)
    }

    /// Internal identities reached from more than one external name.
    pub fn ambiguous_values(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in self.aliases.values() {
            *counts.entry(value.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(v, _)| v)
            .collect()
    }

    /// Name of this store in log output.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Returns true if the store has no aliases.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn warn_ambiguous(&self) {
        for value in self.ambiguous_values() {
            warn!(
                store = %self.label,
                internal = %value,
                chosen = ?self.reverse(value),
                "alias is not one to one; reverse lookup picks the first external name"
            );
        }
    }
}
