//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SessionOpts, SessionPort};

/// Transport address of the local bus. Informational only.
pub const BUS_ADDRESS_ENV: &str = "BUS_ADDRESS";
/// Application name used when connecting.
pub const APP_NAME_ENV: &str = "BUS_APP_NAME";
/// Well-known name to discover.
pub const SERVICE_NAME_ENV: &str = "BUS_SERVICE_NAME";
/// Upper bound on waiting for a session, in milliseconds.
pub const JOIN_TIMEOUT_ENV: &str = "BUS_JOIN_TIMEOUT_MS";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Settings for a bus session client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name passed to the bus on connect.
    pub app_name: String,
    /// Well-known name of the service to discover and join.
    pub service_name: String,
    /// Object path of the remote service object.
    pub object_path: String,
    /// Contact port to join on.
    #[serde(default)]
    pub contact_port: SessionPort,
    /// Options requested on join.
    #[serde(default)]
    pub session_opts: SessionOpts,
    /// Bound on `await_session`.
    pub join_timeout: Duration,
    /// Local transport address, if the environment names one.
    #[serde(default)]
    pub bus_address: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: "AppName".to_string(),
            service_name: "com.my.well.known.name".to_string(),
            object_path: "/myService".to_string(),
            contact_port: SessionPort::DEFAULT_CONTACT,
            session_opts: SessionOpts::default(),
            join_timeout: Duration::from_secs(30),
            bus_address: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(app_name) = lookup(APP_NAME_ENV) {
            config.app_name = app_name;
        }
        if let Some(service_name) = lookup(SERVICE_NAME_ENV) {
            config.service_name = service_name;
        }
        if let Some(raw) = lookup(JOIN_TIMEOUT_ENV) {
            let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: JOIN_TIMEOUT_ENV,
                value: raw.clone(),
            })?;
            config.join_timeout = Duration::from_millis(millis);
        }
        config.bus_address = lookup(BUS_ADDRESS_ENV).filter(|a| !a.trim().is_empty());

        Ok(config)
    }

    /// Set the service name.
    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Set the object path.
    #[must_use]
    pub fn with_object_path(mut self, object_path: impl Into<String>) -> Self {
        self.object_path = object_path.into();
        self
    }

    /// Set the contact port.
    #[must_use]
    pub fn with_contact_port(mut self, port: SessionPort) -> Self {
        self.contact_port = port;
        self
    }

    /// Set the join timeout.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Transport address for logging.
    #[must_use]
    pub fn bus_address_display(&self) -> &str {
        self.bus_address.as_deref().unwrap_or("unspecified")
    }
}
