//! # Node Agent Core
//!
//! RTML gateway between intelligent agents and a telescope embedded
//! agent (TEA).
//!
//! ## Pipeline
//!
//! | Stage | Component | Fails with |
//! |-------|-----------|------------|
//! | Credentials | [`Authenticator`] | [`AuthError`] (returned to caller) |
//! | Parse | `nodeagent_rtml` | [`GatewayError::Parse`] |
//! | Forwarding switch | [`NodeAgent`] | [`GatewayError::NotForwarding`] |
//! | Identity | [`IdentityRewriter`] | [`GatewayError::MalformedDocument`], [`GatewayError::IdentityMismatch`] |
//! | Routing | [`Dispatcher`] | [`GatewayError::UnknownDocumentType`] |
//! | TEA call | `nodeagent_tea` | [`GatewayError::Downstream`] |
//! | Reply | [`FallbackChain`] | never |
//!
//! Updates pushed by the TEA travel the other way through the
//! [`AsyncRelay`].
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        NODE AGENT                          │
//! ├────────────────────────────────────────────────────────────┤
//! │   IA ──handle──▶ Authenticator ─▶ IdentityRewriter (in)    │
//! │                                        │                   │
//! │                                        ▼                   │
//! │   IA ◀──reply── FallbackChain ◀── Dispatcher ──▶ TEA       │
//! │                                                   │        │
//! │   IA ◀──deliver── IdentityRewriter (out) ◀── AsyncRelay    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nodeagent_core::{NodeAgent, NodeAgentConfig, RequestHeaders};
//!
//! let config = NodeAgentConfig::load("/etc/nodeagent/server.configuration")?;
//! let stores = Stores::load(&config.stores)?;
//! let agent = NodeAgent::new(config, stores, connector);
//!
//! let headers = RequestHeaders::with_credentials("alice", "secret");
//! let reply = agent.handle(&headers, &rtml).await?;
//! ```
//!
//! ## Security Notes
//!
//! - Password comparison is plain equality, not constant time
//! - Failed logins are audited under the `nodeagent::audit` target
//! - Only the header user name is alias-resolved before the identity match

pub mod agent;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod headers;
pub mod relay;
pub mod rewrite;

pub use agent::{NodeAgent, PING_LIVE, PING_NOT_LIVE};
pub use auth::{fingerprint, Authenticator, AUDIT_TARGET};
pub use config::{
    AgentConfig, AuditConfig, CallbackConfig, NodeAgentConfig, RelayConfig, ServerConfig,
    TeaConfig, DEFAULT_CALLBACK_BINDING_NAME, DEFAULT_CONFIG_PATH, DEFAULT_NULL_RETURN_PATH,
};
pub use dispatch::{route, Dispatcher};
pub use error::{AuthError, ConfigError, DeliveryError, GatewayError, RelayError, Result};
pub use fallback::{last_resort_document, ErrorReply, FallbackChain, FallbackTier};
pub use headers::{RequestHeaders, PASSWORD_HEADER, USERNAME_HEADER};
pub use relay::{AsyncRelay, DeliveryTarget, LoggingDelivery, RelayOutcome, UpdateDelivery};
pub use rewrite::{Direction, IdentityRewriter, NODE_AGENT_URI};
