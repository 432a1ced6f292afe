//! # Async Relay
//!
//! Carries updates pushed by the telescope back to the agent that asked
//! for them.
//!
//! ```text
//!   update ──▶ destination check ──▶ outbound rewrite ──▶ delivery
//!                    │
//!                    ├─ no IntelligentAgent ────────▶ NoDestination
//!                    ├─ 2.2 without host or port ───▶ NoDestination
//!                    ├─ 3.1a without uri ───────────▶ NoDestination
//!                    ├─ 3.1a null sink / no host ───▶ Dropped (not an error)
//!                    └─ other version ──────────────▶ UnsupportedVersion
//! ```
//!
//! Updates that originate from telescope administration carry the null
//! sink as their return path; dropping them is the normal outcome.
//! Delivery is attempted once.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nodeagent_rtml::{IntelligentAgent, RtmlDocument, RtmlVersion};
use nodeagent_tea::{AsyncResponseHandler, RemoteError};
use tracing::{error, info, warn};
use url::Url;

use crate::error::{DeliveryError, RelayError};
use crate::rewrite::{Direction, IdentityRewriter};

/// Where an update is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// RTML 2.2 callback address.
    HostPort {
        /// Callback host.
        host: String,
        /// Callback port.
        port: u16,
    },
    /// RTML 3.1a callback URI.
    Uri(String),
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostPort { host, port } => write!(f, "{}:{}", host, port),
            Self::Uri(uri) => f.write_str(uri),
        }
    }
}

/// Transport that hands an update to an agent.
#[async_trait]
pub trait UpdateDelivery: Send + Sync {
    /// Delivers `document` to `target`.
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        document: &RtmlDocument,
    ) -> Result<(), DeliveryError>;
}

/// Delivery that only logs. Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDelivery;

#[async_trait]
impl UpdateDelivery for LoggingDelivery {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        document: &RtmlDocument,
    ) -> Result<(), DeliveryError> {
        info!(
            target_addr = %target,
            kind = document.document_type().unwrap_or("none"),
            "update accepted (no delivery transport configured)"
        );
        Ok(())
    }
}

/// Result of relaying one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Handed over to the agent.
    Delivered {
        /// Where it went.
        target: DeliveryTarget,
    },
    /// Nobody to deliver to.
    Dropped {
        /// Why it was dropped.
        reason: String,
    },
}

/// Routes telescope updates back to their agents.
pub struct AsyncRelay {
    rewriter: Arc<IdentityRewriter>,
    delivery: Arc<dyn UpdateDelivery>,
    null_return_path: String,
}

impl AsyncRelay {
    /// Creates a relay using `delivery` as transport.
    pub fn new(
        rewriter: Arc<IdentityRewriter>,
        delivery: Arc<dyn UpdateDelivery>,
        null_return_path: impl Into<String>,
    ) -> Self {
        Self {
            rewriter,
            delivery,
            null_return_path: null_return_path.into(),
        }
    }

    /// Relays one update.
    ///
    /// # Errors
    ///
    /// Fails if the document has no usable return address, an unknown
    /// version, identities that cannot be rewritten, or delivery fails.
    pub async fn relay(&self, document: &RtmlDocument) -> Result<RelayOutcome, RelayError> {
        let Some(agent) = document.intelligent_agent() else {
            error!("update has no IntelligentAgent");
            return Err(RelayError::NoDestination(
                "no IntelligentAgent in update document".to_string(),
            ));
        };

        let target = match self.destination(document, &agent)? {
            Ok(target) => target,
            Err(reason) => {
                warn!(id = %agent.id, reason = %reason, "dropping update");
                return Ok(RelayOutcome::Dropped { reason });
            }
        };

        let rewritten = self
            .rewriter
            .rewrite(document, Direction::Outbound)
            .map_err(|source| {
                error!(id = %agent.id, error = %source, "outbound rewrite failed");
                RelayError::Rewrite {
                    id: agent.id.clone(),
                    source,
                }
            })?;

        info!(id = %agent.id, target_addr = %target, "sending update");
        self.delivery
            .deliver(&target, &rewritten)
            .await
            .map_err(|source| {
                error!(id = %agent.id, target_addr = %target, error = %source, "update delivery failed");
                RelayError::Delivery {
                    target: target.to_string(),
                    id: agent.id.clone(),
                    source,
                }
            })?;

        Ok(RelayOutcome::Delivered { target })
    }

    /// Delivery target, or the reason the update is dropped.
    fn destination(
        &self,
        document: &RtmlDocument,
        agent: &IntelligentAgent,
    ) -> Result<Result<DeliveryTarget, String>, RelayError> {
        match document.rtml_version() {
            RtmlVersion::V22 => {
                let host = agent.hostname.as_deref().unwrap_or("").trim();
                if host.is_empty() {
                    return Err(RelayError::NoDestination(format!(
                        "no host in IntelligentAgent of document {}",
                        agent.id
                    )));
                }
                if agent.port == 0 {
                    return Err(RelayError::NoDestination(format!(
                        "no port in IntelligentAgent of document {}",
                        agent.id
                    )));
                }
                Ok(Ok(DeliveryTarget::HostPort {
                    host: host.to_string(),
                    port: agent.port,
                }))
            }
            RtmlVersion::V31 => {
                let uri = agent.uri.as_deref().unwrap_or("").trim();
                if uri.is_empty() {
                    return Err(RelayError::NoDestination(format!(
                        "no uri in IntelligentAgent of document {}",
                        agent.id
                    )));
                }
                if uri == self.null_return_path {
                    return Ok(Err(format!("return path is the null sink {}", uri)));
                }
                let has_host = Url::parse(uri)
                    .ok()
                    .and_then(|url| url.host_str().map(|h| !h.is_empty()))
                    .unwrap_or(false);
                if !has_host {
                    return Ok(Err(format!("return path {} has no host", uri)));
                }
                Ok(Ok(DeliveryTarget::Uri(uri.to_string())))
            }
            RtmlVersion::Unknown(raw) => {
                error!(version = %raw, "update has unknown rtml version");
                Err(RelayError::UnsupportedVersion(raw))
            }
        }
    }
}

#[async_trait]
impl AsyncResponseHandler for AsyncRelay {
    async fn handle_async_response(&self, document: RtmlDocument) -> Result<(), RemoteError> {
        self.relay(&document)
            .await
            .map(|_| ())
            .map_err(|err| RemoteError::Remote(err.to_string()))
    }
}
