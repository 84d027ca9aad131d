//! Client configuration.

use std::env;

/// Environment variable naming the controller endpoint.
pub const CONTROLLER_HOST_ENV: &str = "CONTROLLER_HOST";

const DEFAULT_CONTROLLER_HOST: &str = "http://127.0.0.1:8080";

/// Configuration handed to a transport when it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Controller endpoint, scheme included.
    pub controller_host: String,
}

impl ClientConfig {
    pub fn new(controller_host: impl Into<String>) -> Self {
        Self {
            controller_host: controller_host.into(),
        }
    }

    /// Read the endpoint from `CONTROLLER_HOST`, falling back to the
    /// local default.
    pub fn from_env() -> Self {
        let controller_host = env::var(CONTROLLER_HOST_ENV)
            .unwrap_or_else(|_| DEFAULT_CONTROLLER_HOST.to_string());
        Self { controller_host }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROLLER_HOST)
    }
}
