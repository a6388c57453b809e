use serde::{Deserialize, Serialize};

use crate::Environment;

/// Base URL of the live Openfort backend.
pub const PRODUCTION_BACKEND_URL: &str = "https://api.openfort.xyz";

/// Base URL of the staging Openfort backend.
pub const STAGING_BACKEND_URL: &str = "https://api.staging.openfort.xyz";

/// Configuration for constructing a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Publishable API key identifying the Openfort project.
    pub publishable_key: String,
    /// Environment the client targets. Defaults to [`Environment::Production`].
    #[serde(default = "default_environment")]
    pub environment: Environment,
    /// Overrides the backend base URL. Intended for self-hosted gateways and
    /// tests; when unset the environment's default backend is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
}

const fn default_environment() -> Environment {
    Environment::Production
}

impl ClientConfig {
    /// Creates a configuration for the given publishable key, targeting
    /// production.
    pub fn new(publishable_key: impl Into<String>) -> Self {
        Self {
            publishable_key: publishable_key.into(),
            environment: Environment::Production,
            backend_url: None,
        }
    }

    /// Sets the target environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets an explicit backend base URL.
    #[must_use]
    pub fn with_backend_url(mut self, backend_url: impl Into<String>) -> Self {
        self.backend_url = Some(backend_url.into());
        self
    }

    /// The backend base URL this configuration resolves to, without a
    /// trailing slash.
    #[must_use]
    pub fn resolved_backend_url(&self) -> &str {
        self.backend_url
            .as_deref()
            .map_or_else(
                || match self.environment {
                    Environment::Staging => STAGING_BACKEND_URL,
                    Environment::Production => PRODUCTION_BACKEND_URL,
                },
                |url| url.trim_end_matches('/'),
            )
    }
}
