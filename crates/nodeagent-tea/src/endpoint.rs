//! Remote interfaces on either side of the gateway.
//!
//! [`TeaEndpoint`] is what the telescope embedded agent exposes to the
//! gateway. [`AsyncResponseHandler`] is what the gateway exposes back so
//! the telescope can push updates.

use std::fmt;

use async_trait::async_trait;
use nodeagent_rtml::RtmlDocument;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// The four calls the telescope agent accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeaOperation {
    /// Feasibility scoring.
    Score,
    /// Observation submission.
    Request,
    /// Cancellation.
    Abort,
    /// Update forwarding.
    Update,
}

impl TeaOperation {
    /// Every operation, in slot order.
    pub const ALL: [Self; 4] = [Self::Score, Self::Request, Self::Abort, Self::Update];

    /// Remote method name.
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::Score => "handleScore",
            Self::Request => "handleRequest",
            Self::Abort => "handleAbort",
            Self::Update => "handleUpdate",
        }
    }

    pub(crate) const fn slot(&self) -> usize {
        match self {
            Self::Score => 0,
            Self::Request => 1,
            Self::Abort => 2,
            Self::Update => 3,
        }
    }
}

impl fmt::Display for TeaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Request handler of the telescope embedded agent.
#[async_trait]
pub trait TeaEndpoint: Send + Sync {
    /// Performs one operation and returns the telescope's reply.
    async fn call(
        &self,
        operation: TeaOperation,
        document: RtmlDocument,
    ) -> std::result::Result<RtmlDocument, RemoteError>;
}

/// Callback the telescope uses to push asynchronous updates.
#[async_trait]
pub trait AsyncResponseHandler: Send + Sync {
    /// Accepts one update document.
    async fn handle_async_response(
        &self,
        document: RtmlDocument,
    ) -> std::result::Result<(), RemoteError>;
}
