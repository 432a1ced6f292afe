//! Username to password map used by the authenticator.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::property::PropertyMap;

/// Read-only credential store.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    passwords: BTreeMap<String, String>,
}

impl CredentialStore {
    /// Builds a store from `(username, password)` pairs.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            passwords: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Loads a store from a property file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`](crate::StoreError::Io) if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from(PropertyMap::load(path)?))
    }

    /// Expected password for a user.
    pub fn password_for(&self, username: &str) -> Option<&str> {
        self.passwords.get(username).map(String::as_str)
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.passwords.len()
    }

    /// Returns true if no users are configured.
    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty()
    }
}

impl From<PropertyMap> for CredentialStore {
    fn from(props: PropertyMap) -> Self {
        Self {
            passwords: props.into_inner(),
        }
    }
}
