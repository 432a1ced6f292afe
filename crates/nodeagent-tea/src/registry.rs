//! # Name Registry
//!
//! Remote objects are found by URL-style names such as
//! `rmi://tea-host/EARequestHandler`. The registry is a seam: the server
//! binary runs an in-process [`LocalRegistry`], tests script their own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::endpoint::{AsyncResponseHandler, TeaEndpoint};
use crate::error::RegistryError;

/// Object bound under a registry name.
#[derive(Clone)]
pub enum Binding {
    /// A telescope request handler.
    Endpoint(Arc<dyn TeaEndpoint>),
    /// A gateway callback handle.
    ResponseHandler(Arc<dyn AsyncResponseHandler>),
}

impl Binding {
    /// The request handler, if that is what is bound.
    pub fn as_endpoint(&self) -> Option<Arc<dyn TeaEndpoint>> {
        match self {
            Self::Endpoint(endpoint) => Some(Arc::clone(endpoint)),
            Self::ResponseHandler(_) => None,
        }
    }

    /// The callback handle, if that is what is bound.
    pub fn as_response_handler(&self) -> Option<Arc<dyn AsyncResponseHandler>> {
        match self {
            Self::ResponseHandler(handler) => Some(Arc::clone(handler)),
            Self::Endpoint(_) => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint(_) => f.write_str("Binding::Endpoint"),
            Self::ResponseHandler(_) => f.write_str("Binding::ResponseHandler"),
        }
    }
}

/// Name service for remote objects.
#[async_trait]
pub trait NameRegistry: Send + Sync {
    /// Finds the object bound under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotBound`] if nothing is bound, any other variant
    /// if the registry could not answer.
    async fn lookup(&self, name: &str) -> Result<Binding, RegistryError>;

    /// Binds `binding` under `name`, replacing any previous binding.
    async fn rebind(&self, name: &str, binding: Binding) -> Result<(), RegistryError>;

    /// Removes the binding under `name`.
    async fn unbind(&self, name: &str) -> Result<(), RegistryError>;
}

/// In-process registry.
#[derive(Default, Clone)]
pub struct LocalRegistry {
    bindings: Arc<RwLock<HashMap<String, Binding>>>,
}

impl LocalRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns true if something is bound under `name`.
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }
}

#[async_trait]
impl NameRegistry for LocalRegistry {
    async fn lookup(&self, name: &str) -> Result<Binding, RegistryError> {
        self.bindings
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotBound(name.to_string()))
    }

    async fn rebind(&self, name: &str, binding: Binding) -> Result<(), RegistryError> {
        self.bindings.write().insert(name.to_string(), binding);
        Ok(())
    }

    async fn unbind(&self, name: &str) -> Result<(), RegistryError> {
        self.bindings
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotBound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::TeaOperation;
    use crate::error::RemoteError;
    use nodeagent_rtml::RtmlDocument;

    struct Echo;

    #[async_trait]
    impl TeaEndpoint for Echo {
        async fn call(
            &self,
            _operation: TeaOperation,
            document: RtmlDocument,
        ) -> Result<RtmlDocument, RemoteError> {
            Ok(document)
        }
    }

    #[tokio::test]
    async fn test_bind_lookup_unbind() {
        let registry = LocalRegistry::new();
        let name = "rmi://tea/EARequestHandler";

        assert_eq!(
            registry.lookup(name).await.unwrap_err(),
            RegistryError::NotBound(name.to_string())
        );

        registry
            .rebind(name, Binding::Endpoint(Arc::new(Echo)))
            .await
            .unwrap();
        let binding = registry.lookup(name).await.unwrap();
        assert!(binding.as_endpoint().is_some());
        assert!(binding.as_response_handler().is_none());
        assert_eq!(registry.names(), vec![name.to_string()]);

        registry.unbind(name).await.unwrap();
        assert!(!registry.is_bound(name));
        assert!(matches!(
            registry.unbind(name).await,
            Err(RegistryError::NotBound(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_bindings() {
        let registry = LocalRegistry::new();
        let other = registry.clone();
        registry
            .rebind("a", Binding::Endpoint(Arc::new(Echo)))
            .await
            .unwrap();
        assert!(other.is_bound("a"));
    }
}
