// crates/idmesh-config/src/config.rs
// ============================================================================
// Module: idmesh Configuration
// Description: Configuration loading and validation for an idmesh node.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: idmesh-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the node refuses to start
//! rather than run with defaults it was not asked for.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use idmesh_core::EngineConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "idmesh.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "IDMESH_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a logical chain identifier.
pub(crate) const MAX_CHAIN_ID_LENGTH: usize = 128;
/// Maximum allowed auto-close settle delay in milliseconds.
pub(crate) const MAX_AUTO_CLOSE_DELAY_MS: i64 = 86_400_000;
/// Maximum number of reserved namespaces.
pub(crate) const MAX_RESERVED_NAMESPACES: usize = 64;
/// Maximum length of a reserved namespace entry.
pub(crate) const MAX_NAMESPACE_LENGTH: usize = 64;
/// Minimum request body limit in bytes.
pub(crate) const MIN_BODY_BYTES: usize = 1024;
/// Maximum request body limit in bytes.
pub(crate) const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// Default request body limit in bytes.
pub(crate) const DEFAULT_BODY_BYTES: usize = 1024 * 1024;
/// Minimum sweeper interval in milliseconds.
pub(crate) const MIN_SWEEP_INTERVAL_MS: u64 = 10;
/// Maximum sweeper interval in milliseconds.
pub(crate) const MAX_SWEEP_INTERVAL_MS: u64 = 60_000;
/// Default sweeper interval in milliseconds.
pub(crate) const DEFAULT_SWEEP_INTERVAL_MS: u64 = 250;
/// Maximum number of static callback routes.
pub(crate) const MAX_CALLBACK_ROUTES: usize = 1024;
/// Maximum length of a node identifier in a route entry.
pub(crate) const MAX_NODE_ID_LENGTH: usize = 255;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// idmesh node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Platform engine configuration.
    #[serde(default)]
    pub platform: PlatformConfig,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Timeout and settle sweeper configuration.
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Callback delivery configuration.
    #[serde(default)]
    pub callbacks: CallbackConfig,
    /// Static callback route entries.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Config source metadata (not serialized).
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl NodeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then `IDMESH_CONFIG`, then
    /// `idmesh.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from an in-memory TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.platform.validate()?;
        self.server.validate()?;
        self.sweeper.validate()?;
        self.callbacks.validate()?;
        if self.routes.len() > MAX_CALLBACK_ROUTES {
            return Err(ConfigError::Invalid("too many callback routes".to_string()));
        }
        let mut seen = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            route.validate()?;
            if seen.contains(&route.node_id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate callback route for node: {}",
                    route.node_id
                )));
            }
            seen.push(route.node_id.clone());
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            server: ServerConfig::default(),
            sweeper: SweeperConfig::default(),
            callbacks: CallbackConfig::default(),
            routes: Vec::new(),
            source_modified_at: None,
        }
    }
}

/// Platform engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Logical chain identifier used for block anchors.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Delay between completion and automatic close, in milliseconds.
    #[serde(default = "default_auto_close_delay_ms")]
    pub auto_close_delay_ms: i64,
    /// Namespaces rejected at request creation.
    #[serde(default = "default_reserved_namespaces")]
    pub reserved_namespaces: Vec<String>,
}

impl PlatformConfig {
    /// Validates platform settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let chain = self.chain_id.trim();
        if chain.is_empty() {
            return Err(ConfigError::Invalid("platform.chain_id must be non-empty".to_string()));
        }
        if chain.len() > MAX_CHAIN_ID_LENGTH {
            return Err(ConfigError::Invalid("platform.chain_id exceeds max length".to_string()));
        }
        if chain.contains(':') {
            return Err(ConfigError::Invalid(
                "platform.chain_id must not contain ':'".to_string(),
            ));
        }
        if !(0..=MAX_AUTO_CLOSE_DELAY_MS).contains(&self.auto_close_delay_ms) {
            return Err(ConfigError::Invalid(
                "platform.auto_close_delay_ms out of range".to_string(),
            ));
        }
        if self.reserved_namespaces.len() > MAX_RESERVED_NAMESPACES {
            return Err(ConfigError::Invalid(
                "platform.reserved_namespaces has too many entries".to_string(),
            ));
        }
        let mut seen = Vec::with_capacity(self.reserved_namespaces.len());
        for namespace in &self.reserved_namespaces {
            if namespace.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "platform.reserved_namespaces entries must be non-empty".to_string(),
                ));
            }
            if namespace.len() > MAX_NAMESPACE_LENGTH {
                return Err(ConfigError::Invalid(
                    "platform.reserved_namespaces entry exceeds max length".to_string(),
                ));
            }
            if seen.contains(&namespace) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate reserved namespace: {namespace}"
                )));
            }
            seen.push(namespace);
        }
        Ok(())
    }

    /// Builds the engine configuration for these settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chain_id: self.chain_id.clone(),
            auto_close_delay_ms: self.auto_close_delay_ms,
            reserved_namespaces: self.reserved_namespaces.clone(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            auto_close_delay_ms: default_auto_close_delay_ms(),
            reserved_namespaces: default_reserved_namespaces(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the platform API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind_addr is not a socket address".to_string()))?;
        if !(MIN_BODY_BYTES..=MAX_BODY_BYTES).contains(&self.max_body_bytes) {
            return Err(ConfigError::Invalid("server.max_body_bytes out of range".to_string()));
        }
        Ok(())
    }

    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind_addr is not a socket address".to_string()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_body_bytes(),
        }
    }
}

/// Timeout and settle sweeper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Sweep interval in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub interval_ms: u64,
}

impl SweeperConfig {
    /// Validates sweeper settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SWEEP_INTERVAL_MS..=MAX_SWEEP_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(ConfigError::Invalid("sweeper.interval_ms out of range".to_string()));
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Callback delivery transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackDelivery {
    /// POST events to registered callback URLs.
    Http,
    /// Append JSON-line delivery records to a local file.
    Log,
}

/// Callback delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackConfig {
    /// Delivery transport.
    #[serde(default = "default_delivery")]
    pub delivery: CallbackDelivery,
    /// Log file path, required for log delivery.
    #[serde(default)]
    pub log_path: Option<String>,
}

impl CallbackConfig {
    /// Validates callback settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.delivery {
            CallbackDelivery::Http => Ok(()),
            CallbackDelivery::Log => match &self.log_path {
                Some(path) => validate_path_string("callbacks.log_path", path),
                None => Err(ConfigError::Invalid(
                    "callbacks.log_path must be set for log delivery".to_string(),
                )),
            },
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            delivery: default_delivery(),
            log_path: None,
        }
    }
}

/// Static callback route entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Transport node the route belongs to.
    pub node_id: String,
    /// Callback endpoint URL.
    pub url: String,
}

impl RouteConfig {
    /// Validates one route entry.
    fn validate(&self) -> Result<(), ConfigError> {
        let node = self.node_id.trim();
        if node.is_empty() {
            return Err(ConfigError::Invalid("routes.node_id must be non-empty".to_string()));
        }
        if node.len() > MAX_NODE_ID_LENGTH {
            return Err(ConfigError::Invalid("routes.node_id exceeds max length".to_string()));
        }
        let parsed = Url::parse(&self.url)
            .map_err(|err| ConfigError::Invalid(format!("routes.url is invalid: {err}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ConfigError::Invalid(format!(
                "routes.url has unsupported scheme: {scheme}"
            ))),
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default logical chain identifier.
fn default_chain_id() -> String {
    "idmesh-local".to_string()
}

/// Default auto-close settle delay in milliseconds.
const fn default_auto_close_delay_ms() -> i64 {
    1_000
}

/// Default reserved namespaces.
fn default_reserved_namespaces() -> Vec<String> {
    vec!["requester".to_string()]
}

/// Default platform API bind address.
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default request body limit.
const fn default_body_bytes() -> usize {
    DEFAULT_BODY_BYTES
}

/// Default sweeper interval.
const fn default_sweep_interval_ms() -> u64 {
    DEFAULT_SWEEP_INTERVAL_MS
}

/// Default callback delivery transport.
const fn default_delivery() -> CallbackDelivery {
    CallbackDelivery::Http
}

// ============================================================================
// SECTION: Path Guards
// ============================================================================

/// Resolves the configuration path from explicit, env, or default sources.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates length limits on a config file path.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path-valued configuration field.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
