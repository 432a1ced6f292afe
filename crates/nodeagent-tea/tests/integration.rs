//! # Integration Tests
//!
//! Connector and persistor behaviour against scripted registries and
//! endpoints: resolution on every call, timeouts, serialization policies,
//! and the self-healing binding loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodeagent_rtml::{RtmlDocument, RTML_VERSION_22};
use nodeagent_tea::{
    AsyncResponseHandler, Binding, BindingPersistor, CallSerialization, ConnectorConfig,
    LocalRegistry, NameRegistry, PersistorConfig, PersistorExit, RegistryError, RemoteError,
    TeaConnector, TeaEndpoint, TeaError, TeaOperation,
};
use parking_lot::Mutex;
use tokio::time::{sleep, timeout};

const HANDLER: &str = "rmi://tea/EARequestHandler";
const CALLBACK: &str = "rmi://localhost/NAAsyncResponseHandler";

// ============================================================================
// Test Doubles
// ============================================================================

/// Endpoint that records how many calls overlap.
#[derive(Default)]
struct RecordingEndpoint {
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingEndpoint {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TeaEndpoint for RecordingEndpoint {
    async fn call(
        &self,
        operation: TeaOperation,
        mut document: RtmlDocument,
    ) -> Result<RtmlDocument, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        document.add_history_entry("TEA", "urn:/tea", operation.method_name());
        Ok(document)
    }
}

struct FailingEndpoint;

#[async_trait]
impl TeaEndpoint for FailingEndpoint {
    async fn call(
        &self,
        _operation: TeaOperation,
        _document: RtmlDocument,
    ) -> Result<RtmlDocument, RemoteError> {
        Err(RemoteError::Remote("telescope offline".to_string()))
    }
}

struct NullHandler;

#[async_trait]
impl AsyncResponseHandler for NullHandler {
    async fn handle_async_response(&self, _document: RtmlDocument) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupMode {
    Normal,
    Fail,
    Hang,
}

/// Registry whose lookups and rebinds can be made to misbehave.
struct ScriptedRegistry {
    inner: LocalRegistry,
    lookup_mode: Mutex<LookupMode>,
    rebinds_allowed: Option<usize>,
    rebinds_hang_from: Option<usize>,
    rebinds: AtomicUsize,
}

impl ScriptedRegistry {
    fn new() -> Self {
        Self {
            inner: LocalRegistry::new(),
            lookup_mode: Mutex::new(LookupMode::Normal),
            rebinds_allowed: None,
            rebinds_hang_from: None,
            rebinds: AtomicUsize::new(0),
        }
    }

    fn with_rebind_limit(limit: usize) -> Self {
        Self {
            rebinds_allowed: Some(limit),
            ..Self::new()
        }
    }

    /// Rebinds after the first `count` never complete.
    fn with_hanging_rebinds_after(count: usize) -> Self {
        Self {
            rebinds_hang_from: Some(count),
            ..Self::new()
        }
    }

    fn set_lookup_mode(&self, mode: LookupMode) {
        *self.lookup_mode.lock() = mode;
    }

    fn rebind_count(&self) -> usize {
        self.rebinds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameRegistry for ScriptedRegistry {
    async fn lookup(&self, name: &str) -> Result<Binding, RegistryError> {
        let mode = *self.lookup_mode.lock();
        match mode {
            LookupMode::Normal => self.inner.lookup(name).await,
            LookupMode::Fail => Err(RegistryError::Unreachable("connection refused".to_string())),
            LookupMode::Hang => {
                sleep(Duration::from_secs(3600)).await;
                Err(RegistryError::Unreachable("hung".to_string()))
            }
        }
    }

    async fn rebind(&self, name: &str, binding: Binding) -> Result<(), RegistryError> {
        let attempt = self.rebinds.fetch_add(1, Ordering::SeqCst);
        if self.rebinds_hang_from.is_some_and(|from| attempt >= from) {
            std::future::pending::<()>().await;
        }
        if let Some(limit) = self.rebinds_allowed {
            if attempt >= limit {
                return Err(RegistryError::Failed("registry refused bind".to_string()));
            }
        }
        self.inner.rebind(name, binding).await
    }

    async fn unbind(&self, name: &str) -> Result<(), RegistryError> {
        self.inner.unbind(name).await
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn document() -> RtmlDocument {
    let mut doc = RtmlDocument::new(RTML_VERSION_22);
    doc.set_document_type("score");
    doc
}

fn connector(registry: Arc<dyn NameRegistry>, serialization: CallSerialization) -> TeaConnector {
    let config = ConnectorConfig::new("tea")
        .with_call_timeout(Duration::from_millis(200))
        .with_serialization(serialization);
    TeaConnector::new(registry, config)
}

async fn bind_endpoint(registry: &LocalRegistry, endpoint: Arc<dyn TeaEndpoint>) {
    registry
        .rebind(HANDLER, Binding::Endpoint(endpoint))
        .await
        .unwrap();
}

async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn callback_binding() -> Binding {
    Binding::ResponseHandler(Arc::new(NullHandler))
}

fn fast_persistor(registry: Arc<dyn NameRegistry>) -> BindingPersistor {
    let config = PersistorConfig::new(CALLBACK)
        .with_interval(Duration::from_millis(10))
        .with_check_timeout(Duration::from_millis(50));
    BindingPersistor::new(registry, callback_binding(), config)
}

// ============================================================================
// Connector Tests
// ============================================================================

#[tokio::test]
async fn test_connector_forwards_to_bound_endpoint() {
    let registry = LocalRegistry::new();
    let endpoint = Arc::new(RecordingEndpoint::default());
    bind_endpoint(&registry, endpoint.clone()).await;

    let connector = connector(Arc::new(registry), CallSerialization::Global);
    let replies = [
        connector.handle_score(document()).await.unwrap(),
        connector.handle_request(document()).await.unwrap(),
        connector.handle_abort(document()).await.unwrap(),
        connector.handle_update(document()).await.unwrap(),
    ];

    assert_eq!(endpoint.calls.load(Ordering::SeqCst), 4);
    for (reply, operation) in replies.iter().zip(TeaOperation::ALL) {
        assert_eq!(reply.history()[0].description, operation.method_name());
    }
}

#[tokio::test]
async fn test_connector_unbound_handler_is_unavailable() {
    let connector = connector(Arc::new(LocalRegistry::new()), CallSerialization::Global);
    let err = connector.handle_request(document()).await.unwrap_err();

    let TeaError::Unavailable { operation, reason } = err;
    assert_eq!(operation, TeaOperation::Request);
    assert!(reason.contains(HANDLER));
}

#[tokio::test]
async fn test_connector_remote_failure_is_unavailable() {
    let registry = LocalRegistry::new();
    bind_endpoint(&registry, Arc::new(FailingEndpoint)).await;

    let connector = connector(Arc::new(registry), CallSerialization::Global);
    let err = connector.handle_abort(document()).await.unwrap_err();

    let TeaError::Unavailable { operation, reason } = err;
    assert_eq!(operation, TeaOperation::Abort);
    assert!(reason.contains("telescope offline"));
}

#[tokio::test]
async fn test_connector_call_timeout() {
    let registry = LocalRegistry::new();
    bind_endpoint(
        &registry,
        Arc::new(RecordingEndpoint::with_delay(Duration::from_secs(5))),
    )
    .await;

    let connector = connector(Arc::new(registry), CallSerialization::Global);
    let result = timeout(Duration::from_secs(2), connector.handle_update(document()))
        .await
        .expect("connector must enforce its own timeout");

    let TeaError::Unavailable { reason, .. } = result.unwrap_err();
    assert!(reason.contains("timed out"));
}

#[tokio::test]
async fn test_connector_lookup_timeout() {
    let registry = ScriptedRegistry::new();
    registry.set_lookup_mode(LookupMode::Hang);

    let connector = connector(Arc::new(registry), CallSerialization::Global);
    let result = timeout(Duration::from_secs(2), connector.handle_score(document()))
        .await
        .expect("lookup must be bounded");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connector_rejects_wrong_binding_kind() {
    let registry = LocalRegistry::new();
    registry.rebind(HANDLER, callback_binding()).await.unwrap();

    let connector = connector(Arc::new(registry), CallSerialization::Global);
    let TeaError::Unavailable { reason, .. } =
        connector.handle_score(document()).await.unwrap_err();
    assert!(reason.contains("not a request handler"));
}

#[tokio::test]
async fn test_connector_resolves_on_every_call() {
    let registry = LocalRegistry::new();
    let connector = connector(Arc::new(registry.clone()), CallSerialization::Global);

    assert!(connector.handle_score(document()).await.is_err());

    // TEA comes up after the gateway.
    bind_endpoint(&registry, Arc::new(RecordingEndpoint::default())).await;
    assert!(connector.handle_score(document()).await.is_ok());

    // And goes away again.
    registry.unbind(HANDLER).await.unwrap();
    assert!(connector.handle_score(document()).await.is_err());
}

// ============================================================================
// Serialization Policy Tests
// ============================================================================

#[tokio::test]
async fn test_global_serialization_allows_one_call() {
    let registry = LocalRegistry::new();
    let endpoint = Arc::new(RecordingEndpoint::with_delay(Duration::from_millis(20)));
    bind_endpoint(&registry, endpoint.clone()).await;
    let connector = connector(Arc::new(registry), CallSerialization::Global);

    let (a, b, c, d) = tokio::join!(
        connector.handle_score(document()),
        connector.handle_request(document()),
        connector.handle_abort(document()),
        connector.handle_update(document()),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());
    assert_eq!(endpoint.calls.load(Ordering::SeqCst), 4);
    assert_eq!(endpoint.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_per_operation_serialization_overlaps_kinds() {
    let registry = LocalRegistry::new();
    let endpoint = Arc::new(RecordingEndpoint::with_delay(Duration::from_millis(50)));
    bind_endpoint(&registry, endpoint.clone()).await;
    let connector = connector(Arc::new(registry), CallSerialization::PerOperation);

    let (a, b, c, d) = tokio::join!(
        connector.handle_score(document()),
        connector.handle_request(document()),
        connector.handle_abort(document()),
        connector.handle_update(document()),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());
    assert!(endpoint.max_in_flight.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_per_operation_serialization_orders_same_kind() {
    let registry = LocalRegistry::new();
    let endpoint = Arc::new(RecordingEndpoint::with_delay(Duration::from_millis(20)));
    bind_endpoint(&registry, endpoint.clone()).await;
    let connector = connector(Arc::new(registry), CallSerialization::PerOperation);

    let (a, b, c) = tokio::join!(
        connector.handle_score(document()),
        connector.handle_score(document()),
        connector.handle_score(document()),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(endpoint.max_in_flight.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Binding Persistor Tests
// ============================================================================

#[tokio::test]
async fn test_persistor_binds_then_unbinds_on_stop() {
    let registry = LocalRegistry::new();
    let handle = fast_persistor(Arc::new(registry.clone())).spawn();

    assert!(wait_until(|| registry.is_bound(CALLBACK)).await);
    assert!(handle.is_running());

    let exit = handle.shutdown().await;
    assert_eq!(exit, PersistorExit::Stopped);
    assert!(!registry.is_bound(CALLBACK));
}

#[tokio::test]
async fn test_persistor_stop_is_prompt() {
    let registry = LocalRegistry::new();
    let config = PersistorConfig::new(CALLBACK).with_interval(Duration::from_secs(3600));
    let handle =
        BindingPersistor::new(Arc::new(registry.clone()), callback_binding(), config).spawn();
    assert!(wait_until(|| registry.is_bound(CALLBACK)).await);

    let exit = timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("stop must not wait for the interval");
    assert_eq!(exit, PersistorExit::Stopped);
}

#[tokio::test]
async fn test_persistor_initial_bind_failure_is_not_retried() {
    let registry = Arc::new(ScriptedRegistry::with_rebind_limit(0));
    let mut handle = fast_persistor(registry.clone()).spawn();

    let exit = handle.join().await;
    assert!(matches!(exit, PersistorExit::InitialBindFailed(_)));
    assert!(!handle.is_running());

    sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.rebind_count(), 1);
}

#[tokio::test]
async fn test_persistor_restores_lost_binding() {
    let registry = Arc::new(ScriptedRegistry::new());
    let handle = fast_persistor(registry.clone()).spawn();
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);

    // Registry restart forgets every binding.
    registry.inner.unbind(CALLBACK).await.unwrap();

    assert!(wait_until(|| registry.rebind_count() >= 2).await);
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);
    assert!(handle.is_running());
    assert_eq!(handle.shutdown().await, PersistorExit::Stopped);
}

#[tokio::test]
async fn test_persistor_exits_when_rebind_fails() {
    let registry = Arc::new(ScriptedRegistry::with_rebind_limit(1));
    let mut handle = fast_persistor(registry.clone()).spawn();
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);

    registry.inner.unbind(CALLBACK).await.unwrap();

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    assert!(matches!(exit, PersistorExit::RebindFailed(_)));
}

#[tokio::test]
async fn test_persistor_exits_when_check_fails() {
    let registry = Arc::new(ScriptedRegistry::new());
    let mut handle = fast_persistor(registry.clone()).spawn();
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);

    registry.set_lookup_mode(LookupMode::Fail);

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    match exit {
        PersistorExit::CheckFailed(reason) => assert!(reason.contains("connection refused")),
        other => panic!("unexpected exit: {:?}", other),
    }
}

#[tokio::test]
async fn test_persistor_exits_when_check_hangs() {
    let registry = Arc::new(ScriptedRegistry::new());
    let mut handle = fast_persistor(registry.clone()).spawn();
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);

    registry.set_lookup_mode(LookupMode::Hang);

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    match exit {
        PersistorExit::CheckFailed(reason) => assert!(reason.contains("timed out")),
        other => panic!("unexpected exit: {:?}", other),
    }

    // join is repeatable once finished.
    assert!(handle.join().await.is_abnormal());
}

#[tokio::test]
async fn test_persistor_stop_during_hung_rebind() {
    let registry = Arc::new(ScriptedRegistry::with_hanging_rebinds_after(1));
    let config = PersistorConfig::new(CALLBACK)
        .with_interval(Duration::from_millis(10))
        .with_check_timeout(Duration::from_secs(3600));
    let handle = BindingPersistor::new(registry.clone(), callback_binding(), config).spawn();
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);

    registry.inner.unbind(CALLBACK).await.unwrap();
    assert!(wait_until(|| registry.rebind_count() >= 2).await);

    let exit = timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("stop must interrupt a rebind in flight");
    assert_eq!(exit, PersistorExit::Stopped);
}

#[tokio::test]
async fn test_persistor_hung_rebind_times_out() {
    let registry = Arc::new(ScriptedRegistry::with_hanging_rebinds_after(1));
    let mut handle = fast_persistor(registry.clone()).spawn();
    assert!(wait_until(|| registry.inner.is_bound(CALLBACK)).await);

    registry.inner.unbind(CALLBACK).await.unwrap();

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    match exit {
        PersistorExit::RebindFailed(err) => assert!(err.to_string().contains("timed out")),
        other => panic!("unexpected exit: {:?}", other),
    }
}

#[tokio::test]
async fn test_persistor_hung_initial_bind_times_out() {
    let registry = Arc::new(ScriptedRegistry::with_hanging_rebinds_after(0));
    let mut handle = fast_persistor(registry.clone()).spawn();

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    assert!(matches!(exit, PersistorExit::InitialBindFailed(RegistryError::Unreachable(_))));
}
