//! # Node Agent CLI
//!
//! Process-level wiring for the node agent:
//!
//! - [`server`]: the axum routes in front of [`nodeagent_core::NodeAgent`]
//! - [`transport`]: reqwest-based TEA endpoint and update delivery
//! - [`client`]: the `nodeagent-client` companion
//!
//! The `nodeagent` binary loads the configuration and stores, binds the
//! TEA endpoint and the callback handle in a [`nodeagent_tea::LocalRegistry`],
//! and serves until interrupted.

pub mod client;
pub mod server;
pub mod transport;

pub use client::{ClientArgs, ClientError, GatewayClient};
pub use server::{router, AppState};
pub use transport::{HttpDelivery, HttpTeaEndpoint};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Installs the `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing<W>(writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Already installed by a test harness or an embedding process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .try_init();
}
