//! Configuration types for the node agent.
//!
//! A config is read either from JSON (`*.json`) or from the legacy
//! property file format, whose keys are listed on
//! [`NodeAgentConfig::from_properties`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use nodeagent_store::{PropertyMap, StoreError, StorePaths};
use nodeagent_tea::{
    CallSerialization, ConnectorConfig, PersistorConfig, DEFAULT_REQUEST_HANDLER_NAME,
    DEFAULT_URL_PREFIX,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default location of the property file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nodeagent/server.configuration";

/// Default name the callback handle is bound under.
pub const DEFAULT_CALLBACK_BINDING_NAME: &str = "NAAsyncResponseHandler";

/// Return path meaning "nobody to deliver to".
pub const DEFAULT_NULL_RETURN_PATH: &str = "file:/dev/null";

/// Top-level node agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAgentConfig {
    /// Gateway identity and forwarding switch.
    pub agent: AgentConfig,

    /// Downstream TEA connection.
    pub tea: TeaConfig,

    /// Callback handle binding.
    pub callback: CallbackConfig,

    /// Credential and alias store files.
    pub stores: StorePaths,

    /// Asynchronous relay.
    pub relay: RelayConfig,

    /// Inbound HTTP listener.
    pub server: ServerConfig,

    /// Audit logging.
    pub audit: AuditConfig,
}

/// Gateway identity and forwarding switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name recorded in document history entries.
    pub name: String,

    /// Whether documents are forwarded to the TEA at all.
    pub tea_connected: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "NodeAgent".to_string(),
            tea_connected: false,
        }
    }
}

/// Downstream TEA connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeaConfig {
    /// Host of the TEA name registry.
    pub hostname: String,

    /// Name the TEA request handler is bound under.
    pub request_handler_name: String,

    /// Name the TEA availability predictor is bound under, if any.
    pub availability_predictor_name: Option<String>,

    /// Scheme prefix of registry names.
    pub url_prefix: String,

    /// Bound on resolution and on each call, in milliseconds.
    pub call_timeout_ms: u64,

    /// Ordering of concurrent calls.
    pub serialization: CallSerialization,

    /// HTTP base URL of the TEA request handler, for the server binary.
    pub endpoint_url: Option<String>,
}

impl Default for TeaConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            request_handler_name: DEFAULT_REQUEST_HANDLER_NAME.to_string(),
            availability_predictor_name: None,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            call_timeout_ms: 30_000,
            serialization: CallSerialization::Global,
            endpoint_url: None,
        }
    }
}

/// Callback handle binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Registry name of the callback handle.
    pub binding_name: String,

    /// Pause between binding checks, in seconds.
    pub persist_interval_secs: u64,

    /// Bound on a single check, in milliseconds.
    pub check_timeout_ms: u64,

    /// Exit the process if the binding loop dies.
    pub required: bool,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            binding_name: DEFAULT_CALLBACK_BINDING_NAME.to_string(),
            persist_interval_secs: 60,
            check_timeout_ms: 10_000,
            required: true,
        }
    }
}

/// Asynchronous relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Return URI that marks an update as undeliverable on purpose.
    pub null_return_path: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            null_return_path: DEFAULT_NULL_RETURN_PATH.to_string(),
        }
    }
}

/// Inbound HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub address: String,

    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Audit logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Log submitted and expected passwords verbatim on mismatch.
    ///
    /// When false a short SHA-256 fingerprint is logged instead.
    pub log_cleartext_passwords: bool,
}

impl NodeAgentConfig {
    /// Reads a config file.
    ///
    /// Files ending in `.json` are JSON; anything else is a property file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or holds invalid values. The
    /// result is not validated; call [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            return Ok(serde_json::from_str(&text)?);
        }

        let props = PropertyMap::load(path).map_err(|err| match err {
            StoreError::Io { path, source } => ConfigError::Io { path, source },
        })?;
        Self::from_properties(&props)
    }

    /// Builds a config from property file entries.
    ///
    /// | Key | Field |
    /// |-----|-------|
    /// | `nodeagent.name` | `agent.name` |
    /// | `isteaconnected` | `agent.tea_connected` (only `true`, any case, enables) |
    /// | `tea.hostname` | `tea.hostname` |
    /// | `tea.request.handler.rmi.name` | `tea.request_handler_name` |
    /// | `tea.availability.predictor.rmi.name` | `tea.availability_predictor_name` |
    /// | `tea.url.prefix` | `tea.url_prefix` |
    /// | `tea.call.timeout.ms` | `tea.call_timeout_ms` |
    /// | `tea.call.serialization` | `tea.serialization` (`global`, `per_operation`) |
    /// | `tea.endpoint.url` | `tea.endpoint_url` |
    /// | `nodeagent.response.handler.rmi.name` | `callback.binding_name` |
    /// | `nodeagent.persist.interval.secs` | `callback.persist_interval_secs` |
    /// | `nodeagent.check.timeout.ms` | `callback.check_timeout_ms` |
    /// | `nodeagent.callback.required` | `callback.required` |
    /// | `nodeagent.password.map` | `stores.passwords` |
    /// | `nodeagent.useralias.map` | `stores.user_aliases` |
    /// | `nodeagent.projectalias.map` | `stores.project_aliases` |
    /// | `nodeagent.null.return.path` | `relay.null_return_path` |
    /// | `nodeagent.address` | `server.address` |
    /// | `nodeagent.port` | `server.port` |
    /// | `nodeagent.audit.cleartext.passwords` | `audit.log_cleartext_passwords` |
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable numbers,
    /// booleans or serialization policies.
    pub fn from_properties(props: &PropertyMap) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = props.get("nodeagent.name") {
            config.agent.name = v.to_string();
        }
        if let Some(v) = props.get("isteaconnected") {
            config.agent.tea_connected = v.trim().eq_ignore_ascii_case("true");
        }

        if let Some(v) = props.get("tea.hostname") {
            config.tea.hostname = v.to_string();
        }
        if let Some(v) = props.get("tea.request.handler.rmi.name") {
            config.tea.request_handler_name = v.to_string();
        }
        if let Some(v) = non_empty(props, "tea.availability.predictor.rmi.name") {
            config.tea.availability_predictor_name = Some(v.to_string());
        }
        if let Some(v) = props.get("tea.url.prefix") {
            config.tea.url_prefix = v.to_string();
        }
        if let Some(v) = parse_number(props, "tea.call.timeout.ms")? {
            config.tea.call_timeout_ms = v;
        }
        if let Some(v) = props.get("tea.call.serialization") {
            config.tea.serialization = match v.trim().to_ascii_lowercase().as_str() {
                "global" => CallSerialization::Global,
                "per_operation" | "per-operation" => CallSerialization::PerOperation,
                _ => return Err(invalid("tea.call.serialization", v)),
            };
        }
        if let Some(v) = non_empty(props, "tea.endpoint.url") {
            config.tea.endpoint_url = Some(v.to_string());
        }

        if let Some(v) = props.get("nodeagent.response.handler.rmi.name") {
            config.callback.binding_name = v.to_string();
        }
        if let Some(v) = parse_number(props, "nodeagent.persist.interval.secs")? {
            config.callback.persist_interval_secs = v;
        }
        if let Some(v) = parse_number(props, "nodeagent.check.timeout.ms")? {
            config.callback.check_timeout_ms = v;
        }
        if let Some(v) = parse_bool(props, "nodeagent.callback.required")? {
            config.callback.required = v;
        }

        if let Some(v) = props.get("nodeagent.password.map") {
            config.stores.passwords = PathBuf::from(v);
        }
        if let Some(v) = props.get("nodeagent.useralias.map") {
            config.stores.user_aliases = PathBuf::from(v);
        }
        if let Some(v) = props.get("nodeagent.projectalias.map") {
            config.stores.project_aliases = PathBuf::from(v);
        }

        if let Some(v) = props.get("nodeagent.null.return.path") {
            config.relay.null_return_path = v.to_string();
        }

        if let Some(v) = props.get("nodeagent.address") {
            config.server.address = v.to_string();
        }
        if let Some(v) = parse_number(props, "nodeagent.port")? {
            config.server.port = u16::try_from(v)
                .map_err(|_| invalid("nodeagent.port", &v.to_string()))?;
        }

        if let Some(v) = parse_bool(props, "nodeagent.audit.cleartext.passwords")? {
            config.audit.log_cleartext_passwords = v;
        }

        Ok(config)
    }

    /// Checks the settings for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty agent name, a zero
    /// timeout or interval, or forwarding enabled without a TEA host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.name.trim().is_empty() {
            return Err(ConfigError::Invalid("agent name is empty".to_string()));
        }
        if self.tea.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("tea call timeout is zero".to_string()));
        }
        if self.callback.persist_interval_secs == 0 {
            return Err(ConfigError::Invalid("persist interval is zero".to_string()));
        }
        if self.callback.check_timeout_ms == 0 {
            return Err(ConfigError::Invalid("check timeout is zero".to_string()));
        }
        if self.callback.binding_name.trim().is_empty() {
            return Err(ConfigError::Invalid("callback binding name is empty".to_string()));
        }
        if self.agent.tea_connected && self.tea.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "isteaconnected is true but tea.hostname is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Downstream connector settings.
    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig::new(self.tea.hostname.clone())
            .with_request_handler_name(self.tea.request_handler_name.clone())
            .with_url_prefix(self.tea.url_prefix.clone())
            .with_call_timeout(Duration::from_millis(self.tea.call_timeout_ms))
            .with_serialization(self.tea.serialization)
    }

    /// Binding persistor settings.
    pub fn persistor_config(&self) -> PersistorConfig {
        PersistorConfig::new(self.callback.binding_name.clone())
            .with_interval(Duration::from_secs(self.callback.persist_interval_secs))
            .with_check_timeout(Duration::from_millis(self.callback.check_timeout_ms))
    }
}

fn non_empty<'a>(props: &'a PropertyMap, key: &str) -> Option<&'a str> {
    props.get(key).filter(|v| !v.is_empty())
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(props: &PropertyMap, key: &str) -> Result<Option<u64>, ConfigError> {
    props
        .get(key)
        .map(|v| v.trim().parse::<u64>().map_err(|_| invalid(key, v)))
        .transpose()
}

fn parse_bool(props: &PropertyMap, key: &str) -> Result<Option<bool>, ConfigError> {
    props
        .get(key)
        .map(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(invalid(key, v)),
        })
        .transpose()
}
