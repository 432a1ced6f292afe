//! # Store Loading Tests
//!
//! Exercise the stores against real files in a temporary directory.

use std::fs;

use tempfile::TempDir;

use crate::{AliasStore, CredentialStore, PropertyMap, StoreError, StorePaths, Stores};

// =============================================================================
// Helper Functions
// =============================================================================

fn write_stores(dir: &TempDir) -> StorePaths {
    let paths = StorePaths::in_dir(dir.path());
    fs::write(&paths.passwords, "# users\nalice=secret\nbob=builder\n").unwrap();
    fs::write(&paths.user_aliases, "alice=a.smith\nbob=b.jones\n").unwrap();
    fs::write(&paths.project_aliases, "alice=agent_test\nbob=other_proj\n").unwrap();
    paths
}

// =============================================================================
// Loading Tests
// =============================================================================

#[test]
fn test_load_all_stores() {
    let dir = TempDir::new().unwrap();
    let stores = Stores::load(&write_stores(&dir)).unwrap();

    assert_eq!(stores.credentials.password_for("alice"), Some("secret"));
    assert_eq!(stores.users.resolve("bob"), Some("b.jones"));
    assert_eq!(stores.projects.resolve("alice"), Some("agent_test"));
    assert_eq!(stores.projects.reverse("other_proj"), Some("bob"));
}

#[test]
fn test_missing_file_names_path() {
    let dir = TempDir::new().unwrap();
    let paths = write_stores(&dir);
    fs::remove_file(&paths.user_aliases).unwrap();

    let err = Stores::load(&paths).unwrap_err();
    let StoreError::Io { path, .. } = err;
    assert_eq!(path, paths.user_aliases);
}

#[test]
fn test_individual_loaders() {
    let dir = TempDir::new().unwrap();
    let paths = write_stores(&dir);

    let credentials = CredentialStore::load(&paths.passwords).unwrap();
    assert_eq!(credentials.len(), 2);

    let users = AliasStore::load("user", &paths.user_aliases).unwrap();
    assert_eq!(users.label(), "user");
    assert_eq!(users.reverse("a.smith"), Some("alice"));

    let props = PropertyMap::load(&paths.project_aliases).unwrap();
    assert_eq!(props.get("bob"), Some("other_proj"));
}

#[test]
fn test_empty_files_load_empty_stores() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    fs::write(&paths.passwords, "").unwrap();
    fs::write(&paths.user_aliases, "\n# nothing\n").unwrap();
    fs::write(&paths.project_aliases, "").unwrap();

    let stores = Stores::load(&paths).unwrap();
    assert!(stores.credentials.is_empty());
    assert!(stores.users.is_empty());
    assert!(stores.projects.is_empty());
}

#[test]
fn test_load_latin1_store_files() {
    let dir = TempDir::new().unwrap();
    let paths = write_stores(&dir);
    fs::write(&paths.passwords, b"jos\xe9=s\xe9same\ncarol secret\n").unwrap();
    fs::write(&paths.user_aliases, b"jos\xe9 = j.garc\\u00eda\n").unwrap();

    let stores = Stores::load(&paths).unwrap();
    assert_eq!(stores.credentials.password_for("jos\u{e9}"), Some("s\u{e9}same"));
    assert_eq!(stores.credentials.password_for("carol"), Some("secret"));
    assert_eq!(stores.users.resolve("jos\u{e9}"), Some("j.garc\u{ed}a"));
    assert_eq!(stores.users.reverse("j.garc\u{ed}a"), Some("jos\u{e9}"));
}

// =============================================================================
// Path Tests
// =============================================================================

#[test]
fn test_default_paths() {
    let paths = StorePaths::default();
    assert_eq!(
        paths.passwords.to_str(),
        Some("/etc/nodeagent/userpassword.map")
    );
    assert_eq!(
        paths.project_aliases.to_str(),
        Some("/etc/nodeagent/projectalias.map")
    );
}
