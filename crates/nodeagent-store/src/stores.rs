//! The three stores the gateway loads at startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alias::AliasStore;
use crate::credentials::CredentialStore;
use crate::error::Result;

/// Default directory holding the store files.
pub const DEFAULT_STORE_DIR: &str = "/etc/nodeagent";

/// Default credential file name.
pub const PASSWORD_FILE: &str = "userpassword.map";

/// Default user alias file name.
pub const USER_ALIAS_FILE: &str = "useralias.map";

/// Default project alias file name.
pub const PROJECT_ALIAS_FILE: &str = "projectalias.map";

/// Locations of the store files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorePaths {
    /// Username to password map.
    pub passwords: PathBuf,
    /// External to internal user map.
    pub user_aliases: PathBuf,
    /// External to internal project map.
    pub project_aliases: PathBuf,
}

impl StorePaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            passwords: dir.join(PASSWORD_FILE),
            user_aliases: dir.join(USER_ALIAS_FILE),
            project_aliases: dir.join(PROJECT_ALIAS_FILE),
        }
    }
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_STORE_DIR)
    }
}

/// Credential and alias stores, read once and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    /// Username to password map.
    pub credentials: CredentialStore,
    /// External to internal user map.
    pub users: AliasStore,
    /// External to internal project map.
    pub projects: AliasStore,
}

impl Stores {
    /// Loads all three stores.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`](crate::StoreError::Io) for the first file
    /// that cannot be read.
    pub fn load(paths: &StorePaths) -> Result<Self> {
        let credentials = CredentialStore::load(&paths.passwords)?;
        let users = AliasStore::load("user", &paths.user_aliases)?;
        let projects = AliasStore::load("project", &paths.project_aliases)?;

        info!(
            users = credentials.len(),
            user_aliases = users.len(),
            project_aliases = projects.len(),
            "stores loaded"
        );

        Ok(Self {
            credentials,
            users,
            projects,
        })
    }
}
