//! Routes an inbound document to the matching TEA operation.
//!
//! Routing is a flat table checked in order: score request, request,
//! abort. Updates only travel the other way, through the relay, so an
//! inbound update is as unroutable as an unknown type.

use std::sync::Arc;

use nodeagent_rtml::RtmlDocument;
use nodeagent_tea::{TeaConnector, TeaOperation};
use tracing::debug;

use crate::error::{GatewayError, Result};

/// Operation an inbound document is routed to, if any.
pub fn route(document: &RtmlDocument) -> Option<TeaOperation> {
    if document.is_score_request() {
        Some(TeaOperation::Score)
    } else if document.is_request() {
        Some(TeaOperation::Request)
    } else if document.is_abort() {
        Some(TeaOperation::Abort)
    } else {
        None
    }
}

/// Forwards routable documents to the TEA.
pub struct Dispatcher {
    connector: Arc<TeaConnector>,
}

impl Dispatcher {
    /// Creates a dispatcher over `connector`.
    pub fn new(connector: Arc<TeaConnector>) -> Self {
        Self { connector }
    }

    /// Sends `document` to its TEA operation and returns the reply unchanged.
    ///
    /// # Errors
    ///
    /// [`GatewayError::UnknownDocumentType`] for unroutable documents,
    /// [`GatewayError::Downstream`] if the TEA call fails.
    pub async fn dispatch(&self, document: RtmlDocument) -> Result<RtmlDocument> {
        let Some(operation) = route(&document) else {
            let kind = document.document_type().unwrap_or("none").to_string();
            return Err(GatewayError::UnknownDocumentType(kind));
        };
        debug!(operation = %operation, "dispatching document");
        Ok(self.connector.call(operation, document).await?)
    }
}
