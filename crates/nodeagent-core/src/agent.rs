//! # Node Agent
//!
//! The gateway facade: `ping` and `handle`, wired from a config, the
//! loaded stores and a TEA connector.
//!
//! ```text
//!   headers, rtml
//!        │
//!        ▼
//!   authenticate ──fail──▶ AuthError (to the caller, no document)
//!        │
//!        ▼
//!   parse ─▶ forwarding check ─▶ inbound rewrite ─▶ match identity ─▶ dispatch
//!        │            any failure                                       │
//!        ▼                                                              ▼
//!   fallback chain ──────────────────────────────────────────────▶ rtml reply
//! ```

use std::sync::Arc;

use nodeagent_rtml::RtmlDocument;
use nodeagent_store::Stores;
use nodeagent_tea::TeaConnector;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::config::NodeAgentConfig;
use crate::dispatch::Dispatcher;
use crate::error::{AuthError, GatewayError, Result};
use crate::fallback::{last_resort_document, FallbackChain};
use crate::headers::RequestHeaders;
use crate::relay::{AsyncRelay, UpdateDelivery};
use crate::rewrite::{Direction, IdentityRewriter};

/// Reply to `ping` when documents are forwarded.
pub const PING_LIVE: &str = "ACK";

/// Reply to `ping` when forwarding is switched off.
pub const PING_NOT_LIVE: &str = "NAK (not live)";

/// The RTML gateway.
pub struct NodeAgent {
    config: NodeAgentConfig,
    authenticator: Authenticator,
    rewriter: Arc<IdentityRewriter>,
    dispatcher: Dispatcher,
    fallback: FallbackChain,
}

impl NodeAgent {
    /// Assembles the pipeline.
    pub fn new(config: NodeAgentConfig, stores: Stores, connector: Arc<TeaConnector>) -> Self {
        let Stores {
            credentials,
            users,
            projects,
        } = stores;
        let authenticator = Authenticator::new(
            Arc::new(credentials),
            config.audit.log_cleartext_passwords,
        );
        let rewriter = Arc::new(IdentityRewriter::new(
            Arc::new(users),
            Arc::new(projects),
            config.agent.name.clone(),
        ));
        let fallback = FallbackChain::new(config.agent.name.clone());

        info!(
            name = %config.agent.name,
            tea_connected = config.agent.tea_connected,
            "node agent ready"
        );

        Self {
            authenticator,
            rewriter,
            dispatcher: Dispatcher::new(connector),
            fallback,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &NodeAgentConfig {
        &self.config
    }

    /// Shared identity rewriter.
    pub fn rewriter(&self) -> Arc<IdentityRewriter> {
        Arc::clone(&self.rewriter)
    }

    /// Builds the async relay over `delivery`, sharing this agent's aliases.
    pub fn build_relay(&self, delivery: Arc<dyn UpdateDelivery>) -> AsyncRelay {
        AsyncRelay::new(
            self.rewriter(),
            delivery,
            self.config.relay.null_return_path.clone(),
        )
    }

    /// Liveness check.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the credentials are not accepted.
    pub fn ping(&self, headers: &RequestHeaders) -> std::result::Result<String, AuthError> {
        let span = info_span!("ping", request_id = %Uuid::new_v4());
        let _enter = span.enter();

        self.authenticator.authenticate(headers)?;
        let reply = if self.config.agent.tea_connected {
            PING_LIVE
        } else {
            PING_NOT_LIVE
        };
        debug!(reply = %reply, "ping");
        Ok(reply.to_string())
    }

    /// Runs one document through the gateway.
    ///
    /// Always yields a parseable RTML string once the caller is
    /// authenticated; pipeline failures become reject documents.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the credentials are not accepted.
    pub async fn handle(
        &self,
        headers: &RequestHeaders,
        input: &str,
    ) -> std::result::Result<String, AuthError> {
        let span = info_span!("handle_rtml", request_id = %Uuid::new_v4());
        async {
            let username = self.authenticator.authenticate(headers)?;

            let reply = match self.process(&username, input).await {
                Ok(document) => match document.to_xml_string() {
                    Ok(xml) => xml,
                    Err(err) => {
                        let err = GatewayError::Serialize(err);
                        error!(error = %err, "returning last resort reject");
                        last_resort_document(&err.to_string())
                    }
                },
                Err(err) => self.fallback.reply(&err.to_string(), input).xml,
            };
            Ok(reply)
        }
        .instrument(span)
        .await
    }

    async fn process(&self, username: &str, input: &str) -> Result<RtmlDocument> {
        let document = RtmlDocument::parse(input)?;
        debug!(
            user = %username,
            kind = document.document_type().unwrap_or("none"),
            "received document"
        );

        if !self.config.agent.tea_connected {
            return Err(GatewayError::NotForwarding);
        }

        let document = self.rewriter.rewrite(&document, Direction::Inbound)?;
        self.rewriter.match_identity(username, &document)?;
        self.dispatcher.dispatch(document).await
    }
}
