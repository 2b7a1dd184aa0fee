//! HTTP listener settings

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::error::ValidationError;

/// Smallest accepted webhook body limit. Real events are never this small,
/// but anything lower rejects the processor's test pings.
pub const MIN_WEBHOOK_BODY_BYTES: usize = 1024;

/// Largest accepted webhook body limit.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 5 * 1024 * 1024;

const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request deadline applied by the timeout layer
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest webhook body read before answering 413. The whole body is
    /// buffered for signature verification, so this bounds memory per request.
    #[serde(default = "default_webhook_body_limit")]
    pub webhook_body_limit_bytes: usize,

    /// Comma-separated origins of the directory web app; `*` allows any
    pub cors_origins: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ValidationError::InvalidBindAddress)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured CORS origins, blanks dropped.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether the web app origin list is the `*` wildcard.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins_list().iter().any(|origin| origin == "*")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&self.request_timeout_secs) {
            return Err(ValidationError::InvalidTimeout);
        }
        if !(MIN_WEBHOOK_BODY_BYTES..=MAX_WEBHOOK_BODY_BYTES)
            .contains(&self.webhook_body_limit_bytes)
        {
            return Err(ValidationError::InvalidWebhookBodyLimit);
        }
        // A wildcard lets any site drive the billing endpoints from a
        // signed-in browser.
        if self.is_production() && self.allows_any_origin() {
            return Err(ValidationError::WildcardCorsInProduction);
        }
        self.socket_addr().map(|_| ())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
            webhook_body_limit_bytes: default_webhook_body_limit(),
            cors_origins: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info,provider_directory=debug".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_webhook_body_limit() -> usize {
    256 * 1024
}
