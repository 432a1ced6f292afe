//! # Binding Persistor
//!
//! Keeps the gateway's callback handle bound in the name registry so the
//! telescope can always find it, even after the registry restarts and
//! forgets its bindings.
//!
//! ```text
//!   rebind ──fail──▶ InitialBindFailed
//!     │
//!     ▼
//!   ┌──────────────────────────┐
//!   │ wait interval or stop    │──stop──▶ unbind ──▶ Stopped
//!   └────────────┬─────────────┘
//!                ▼
//!             check ──ok──────────────▶ (wait again)
//!                │
//!                ├─NotBound─▶ rebind ──ok──▶ (wait again)
//!                │              └─fail──▶ RebindFailed
//!                └─other/timeout──────▶ CheckFailed
//! ```
//!
//! A stop request is seen immediately, not at the end of the interval,
//! and also interrupts a check or rebind in flight. Every registry call is
//! bounded by the check timeout; a timed out rebind counts as a failed one.
//! The loop never panics; every exit path is reported as a
//! [`PersistorExit`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::error::RegistryError;
use crate::registry::{Binding, NameRegistry};

/// Default pause between checks.
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_secs(60);

/// Default bound on a single check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Persistor settings.
#[derive(Debug, Clone)]
pub struct PersistorConfig {
    /// Registry name of the callback handle.
    pub name: String,
    /// Pause between checks.
    pub interval: Duration,
    /// Bound on a single check.
    pub check_timeout: Duration,
}

impl PersistorConfig {
    /// Creates a config for `name` with default timings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: DEFAULT_PERSIST_INTERVAL,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Sets the check interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the check timeout.
    #[must_use]
    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }
}

/// Why the persistor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistorExit {
    /// A stop was requested.
    Stopped,
    /// The first bind failed; nothing was ever bound.
    InitialBindFailed(RegistryError),
    /// The binding was lost and could not be restored.
    RebindFailed(RegistryError),
    /// The registry could not be checked.
    CheckFailed(String),
    /// The task panicked or was aborted.
    Aborted(String),
}

impl PersistorExit {
    /// Returns true for exits other than a requested stop.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Background task that keeps a binding alive.
pub struct BindingPersistor {
    registry: Arc<dyn NameRegistry>,
    binding: Binding,
    config: PersistorConfig,
}

impl BindingPersistor {
    /// Creates a persistor for `binding`.
    pub fn new(registry: Arc<dyn NameRegistry>, binding: Binding, config: PersistorConfig) -> Self {
        Self {
            registry,
            binding,
            config,
        }
    }

    /// Starts the loop on the current runtime.
    pub fn spawn(self) -> PersistorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        PersistorHandle {
            shutdown_tx,
            task: Some(task),
            exit: None,
        }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> PersistorExit {
        let name = self.config.name.as_str();

        let bound = tokio::select! {
            bound = self.bind(name) => bound,
            _ = stop_requested(&mut shutdown_rx) => return self.release(name).await,
        };
        if let Err(err) = bound {
            error!(name = %name, error = %err, "initial bind failed; callbacks disabled");
            return PersistorExit::InitialBindFailed(err);
        }
        info!(
            name = %name,
            interval_ms = self.config.interval.as_millis() as u64,
            "callback handle bound"
        );

        loop {
            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = stop_requested(&mut shutdown_rx) => break,
            }

            let lookup = tokio::select! {
                lookup = timeout(self.config.check_timeout, self.registry.lookup(name)) => lookup,
                _ = stop_requested(&mut shutdown_rx) => break,
            };
            match lookup {
                Ok(Ok(_)) => debug!(name = %name, "binding still present"),
                Ok(Err(RegistryError::NotBound(_))) => {
                    warn!(name = %name, "binding lost; rebinding");
                    let rebound = tokio::select! {
                        rebound = self.bind(name) => rebound,
                        _ = stop_requested(&mut shutdown_rx) => break,
                    };
                    if let Err(err) = rebound {
                        error!(name = %name, error = %err, "rebind failed");
                        return PersistorExit::RebindFailed(err);
                    }
                    info!(name = %name, "callback handle rebound");
                }
                Ok(Err(err)) => {
                    error!(name = %name, error = %err, "binding check failed");
                    return PersistorExit::CheckFailed(err.to_string());
                }
                Err(_) => {
                    error!(name = %name, "binding check timed out");
                    return PersistorExit::CheckFailed(format!(
                        "check timed out after {:?}",
                        self.config.check_timeout
                    ));
                }
            }
        }

        self.release(name).await
    }

    /// Binds the handle, bounded by the check timeout.
    async fn bind(&self, name: &str) -> Result<(), RegistryError> {
        match timeout(
            self.config.check_timeout,
            self.registry.rebind(name, self.binding.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Unreachable(format!(
                "rebind timed out after {:?}",
                self.config.check_timeout
            ))),
        }
    }

    async fn release(&self, name: &str) -> PersistorExit {
        match timeout(self.config.check_timeout, self.registry.unbind(name)).await {
            Ok(Ok(())) | Ok(Err(RegistryError::NotBound(_))) => {
                info!(name = %name, "callback handle unbound")
            }
            Ok(Err(err)) => warn!(name = %name, error = %err, "unbind on stop failed"),
            Err(_) => warn!(name = %name, "unbind on stop timed out"),
        }
        PersistorExit::Stopped
    }
}

/// Resolves once a stop is requested or the handle is dropped.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which is treated as a stop.
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Control handle for a running persistor.
pub struct PersistorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<PersistorExit>>,
    exit: Option<PersistorExit>,
}

impl PersistorHandle {
    /// Asks the loop to unbind and stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns true while the loop is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits for the loop to finish and returns why it did.
    ///
    /// Cancel safe, and may be called again after it has returned.
    pub async fn join(&mut self) -> PersistorExit {
        if let Some(exit) = &self.exit {
            return exit.clone();
        }
        let exit = match self.task.as_mut() {
            Some(task) => match task.await {
                Ok(exit) => exit,
                Err(err) => PersistorExit::Aborted(err.to_string()),
            },
            None => PersistorExit::Aborted("task missing".to_string()),
        };
        self.task = None;
        self.exit = Some(exit.clone());
        exit
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(mut self) -> PersistorExit {
        self.stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PersistorConfig::new("rmi://localhost/NAAsyncResponseHandler");
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.check_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_only_stop_is_normal() {
        assert!(!PersistorExit::Stopped.is_abnormal());
        assert!(PersistorExit::CheckFailed("x".to_string()).is_abnormal());
        assert!(
            PersistorExit::InitialBindFailed(RegistryError::Unreachable("x".to_string()))
                .is_abnormal()
        );
    }
}
