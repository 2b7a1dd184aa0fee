//! Hosted backend configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Hosted backend configuration (REST gateway)
///
/// Without a URL the server runs against an in-memory backend, which is only
/// allowed outside production.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend project
    pub url: Option<String>,

    /// Service role key for table and storage access
    #[serde(default = "empty_secret")]
    pub service_key: SecretString,
}

impl BackendConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url.is_none()
    }

    /// Validate backend configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let Some(url) = &self.url else {
            if *environment == Environment::Production {
                return Err(ValidationError::MissingRequired("BACKEND__URL"));
            }
            return Ok(());
        };

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ValidationError::InvalidBackendUrl);
        }
        if *environment == Environment::Production && !url.starts_with("https://") {
            return Err(ValidationError::InvalidBackendUrl);
        }
        if self.service_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("BACKEND__SERVICE_KEY"));
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: empty_secret(),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}
