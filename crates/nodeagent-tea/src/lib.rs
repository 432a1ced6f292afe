//! # nodeagent-tea - Downstream Connector
//!
//! Everything between the gateway and the telescope embedded agent (TEA):
//!
//! - [`TeaConnector`] forwards score, request, abort and update documents
//!   to the TEA request handler, resolving it by name on every call.
//! - [`BindingPersistor`] keeps the gateway's own callback handle bound in
//!   the name registry so the TEA can push updates back.
//!
//! ## Architecture
//!
//! ```text
//!            ┌───────────────────── NameRegistry ─────────────────────┐
//!            │  rmi://tea/EARequestHandler   rmi://na/NAAsyncResp...  │
//!            └──────────▲──────────────────────────────▲──────────────┘
//!                lookup │ (every call)          rebind │ (every interval)
//!            ┌──────────┴─────────┐          ┌─────────┴──────────┐
//!  gateway ─▶│    TeaConnector    │          │  BindingPersistor  │
//!            │ serialize, timeout │          │  check / rebind    │
//!            └──────────┬─────────┘          └────────────────────┘
//!                  call ▼
//!            ┌────────────────────┐   handle_async_response
//!            │    TeaEndpoint     │ ───────────────────────▶ gateway relay
//!            └────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nodeagent_tea::{ConnectorConfig, LocalRegistry, TeaConnector};
//!
//! # async fn demo(doc: nodeagent_rtml::RtmlDocument) -> Result<(), nodeagent_tea::TeaError> {
//! let registry = Arc::new(LocalRegistry::new());
//! let config = ConnectorConfig::new("ltproxy").with_call_timeout(Duration::from_secs(5));
//! let connector = TeaConnector::new(registry, config);
//! let reply = connector.handle_score(doc).await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod endpoint;
pub mod error;
pub mod persistor;
pub mod registry;

pub use connector::{
    CallSerialization, ConnectorConfig, TeaConnector, DEFAULT_CALL_TIMEOUT,
    DEFAULT_REQUEST_HANDLER_NAME, DEFAULT_URL_PREFIX,
};
pub use endpoint::{AsyncResponseHandler, TeaEndpoint, TeaOperation};
pub use error::{RegistryError, RemoteError, Result, TeaError};
pub use persistor::{
    BindingPersistor, PersistorConfig, PersistorExit, PersistorHandle, DEFAULT_PERSIST_INTERVAL,
    DEFAULT_CHECK_TIMEOUT,
};
pub use registry::{Binding, LocalRegistry, NameRegistry};
