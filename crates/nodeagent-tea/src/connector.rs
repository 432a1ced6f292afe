//! # TEA Connector
//!
//! Forwards documents to the telescope embedded agent (TEA).
//!
//! The handler is resolved by name on every call, so a TEA restart is
//! picked up without restarting the gateway. Nothing is retried: a failed
//! resolution or call is reported once and the gateway turns it into a
//! reject reply.
//!
//! ## Call Serialization
//!
//! | Policy | In flight at once |
//! |--------|-------------------|
//! | [`CallSerialization::Global`] | one call, whatever the operation |
//! | [`CallSerialization::PerOperation`] | one call per operation kind |
//!
//! The lock is taken before resolution and held until the reply (or the
//! timeout) arrives. Waiting for the lock is not bounded by the call
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use nodeagent_rtml::RtmlDocument;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::endpoint::{TeaEndpoint, TeaOperation};
use crate::error::{Result, TeaError};
use crate::registry::NameRegistry;

/// Default remote URL prefix.
pub const DEFAULT_URL_PREFIX: &str = "rmi://";

/// Default name of the TEA request handler.
pub const DEFAULT_REQUEST_HANDLER_NAME: &str = "EARequestHandler";

/// Default bound on resolution and on the call itself.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// How concurrent downstream calls are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSerialization {
    /// At most one call in flight across all operations.
    #[default]
    Global,
    /// At most one call in flight per operation kind.
    PerOperation,
}

/// Connector settings.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Host running the TEA registry.
    pub tea_host: String,
    /// Name the TEA request handler is bound under.
    pub request_handler_name: String,
    /// Scheme prefix of registry names.
    pub url_prefix: String,
    /// Bound on resolution and on the call.
    pub call_timeout: Duration,
    /// Ordering of concurrent calls.
    pub serialization: CallSerialization,
}

impl ConnectorConfig {
    /// Creates a config for the given TEA host with default values.
    pub fn new(tea_host: impl Into<String>) -> Self {
        Self {
            tea_host: tea_host.into(),
            request_handler_name: DEFAULT_REQUEST_HANDLER_NAME.to_string(),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            serialization: CallSerialization::Global,
        }
    }

    /// Sets the request handler name.
    #[must_use]
    pub fn with_request_handler_name(mut self, name: impl Into<String>) -> Self {
        self.request_handler_name = name.into();
        self
    }

    /// Sets the URL prefix.
    #[must_use]
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Sets the call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Sets the serialization policy.
    #[must_use]
    pub const fn with_serialization(mut self, serialization: CallSerialization) -> Self {
        self.serialization = serialization;
        self
    }

    /// Registry name of the TEA request handler.
    pub fn handler_url(&self) -> String {
        format!(
            "{}{}/{}",
            self.url_prefix, self.tea_host, self.request_handler_name
        )
    }
}

/// Client for the TEA request handler.
pub struct TeaConnector {
    registry: Arc<dyn NameRegistry>,
    config: ConnectorConfig,
    locks: Vec<Mutex<()>>,
}

impl TeaConnector {
    /// Creates a connector resolving through `registry`.
    pub fn new(registry: Arc<dyn NameRegistry>, config: ConnectorConfig) -> Self {
        let slots = match config.serialization {
            CallSerialization::Global => 1,
            CallSerialization::PerOperation => TeaOperation::ALL.len(),
        };
        Self {
            registry,
            config,
            locks: (0..slots).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Connector settings.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Performs one downstream operation.
    ///
    /// # Errors
    ///
    /// Returns [`TeaError::Unavailable`] if the handler cannot be resolved,
    /// the call fails, or either step exceeds the call timeout.
    pub async fn call(&self, operation: TeaOperation, document: RtmlDocument) -> Result<RtmlDocument> {
        let slot = operation.slot() % self.locks.len();
        let _guard = self.locks[slot].lock().await;

        let url = self.config.handler_url();
        let endpoint = self.resolve(operation, &url).await?;

        debug!(operation = %operation, url = %url, "calling TEA");
        match timeout(self.config.call_timeout, endpoint.call(operation, document)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => {
                warn!(operation = %operation, url = %url, error = %err, "TEA call failed");
                Err(TeaError::unavailable(operation, err.to_string()))
            }
            Err(_) => {
                warn!(operation = %operation, url = %url, "TEA call timed out");
                Err(TeaError::unavailable(
                    operation,
                    format!("call timed out after {:?}", self.config.call_timeout),
                ))
            }
        }
    }

    async fn resolve(&self, operation: TeaOperation, url: &str) -> Result<Arc<dyn TeaEndpoint>> {
        let binding = match timeout(self.config.call_timeout, self.registry.lookup(url)).await {
            Ok(Ok(binding)) => binding,
            Ok(Err(err)) => {
                warn!(operation = %operation, url = %url, error = %err, "TEA lookup failed");
                return Err(TeaError::unavailable(operation, err.to_string()));
            }
            Err(_) => {
                warn!(operation = %operation, url = %url, "TEA lookup timed out");
                return Err(TeaError::unavailable(
                    operation,
                    format!("lookup of {} timed out after {:?}", url, self.config.call_timeout),
                ));
            }
        };
        binding.as_endpoint().ok_or_else(|| {
            TeaError::unavailable(operation, format!("{} is not a request handler", url))
        })
    }

    /// Forwards a score request.
    pub async fn handle_score(&self, document: RtmlDocument) -> Result<RtmlDocument> {
        self.call(TeaOperation::Score, document).await
    }

    /// Forwards an observation request.
    pub async fn handle_request(&self, document: RtmlDocument) -> Result<RtmlDocument> {
        self.call(TeaOperation::Request, document).await
    }

    /// Forwards an abort.
    pub async fn handle_abort(&self, document: RtmlDocument) -> Result<RtmlDocument> {
        self.call(TeaOperation::Abort, document).await
    }

    /// Forwards an update.
    pub async fn handle_update(&self, document: RtmlDocument) -> Result<RtmlDocument> {
        self.call(TeaOperation::Update, document).await
    }
}
