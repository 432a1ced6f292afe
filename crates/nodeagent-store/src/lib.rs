//! # nodeagent-store - Credential and Alias Stores
//!
//! Flat-file lookup tables read once at startup:
//!
//! | File | Store | Maps |
//! |------|-------|------|
//! | `userpassword.map` | [`CredentialStore`] | username → password |
//! | `useralias.map` | [`AliasStore`] | external user → telescope user |
//! | `projectalias.map` | [`AliasStore`] | external project → telescope project |
//!
//! All three use the [`PropertyMap`] line format. The stores are immutable
//! after loading and safe to share between request handlers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nodeagent_store::{StorePaths, Stores};
//!
//! let stores = Stores::load(&StorePaths::in_dir("/etc/nodeagent")).unwrap();
//! if let Some(user) = stores.users.resolve("alice") {
//!     println!("alice is {} at the telescope", user);
//! }
//! ```

pub mod alias;
pub mod credentials;
pub mod error;
pub mod property;
pub mod stores;

pub use alias::AliasStore;
pub use credentials::CredentialStore;
pub use error::{Result, StoreError};
pub use property::PropertyMap;
pub use stores::{
    StorePaths, Stores, DEFAULT_STORE_DIR, PASSWORD_FILE, PROJECT_ALIAS_FILE, USER_ALIAS_FILE,
};

#[cfg(test)]
mod tests;
