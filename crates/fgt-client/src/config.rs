//! Client configuration shared by every device connection in a run

use std::net::Ipv4Addr;
use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Path prefix of the FortiOS REST API
pub const API_PREFIX: &str = "/api/v2/";

/// Connection settings applied to every device
///
/// One value is built per run and passed explicitly to each workflow; the
/// per-device part (address and token) is supplied when a client is created.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL scheme, `https` unless a test harness overrides it
    pub scheme: String,

    /// Management port override (FortiOS `admin-sport`), `None` for the scheme default
    pub port: Option<u16>,

    /// Accept self-signed or otherwise unverifiable certificates
    pub insecure: bool,

    pub timeouts: TimeoutsConfig,
}

/// Timeout configuration
#[derive(Debug, Clone)]
pub struct TimeoutsConfig {
    /// General request timeout in milliseconds (default: 30s)
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    pub connect_ms: u64,

    /// Firmware image upload timeout in milliseconds (default: 5 minutes)
    pub upload_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
            upload_ms: default_upload_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_upload_timeout() -> u64 {
    300_000 // 5 minutes
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            port: None,
            insecure: false,
            timeouts: TimeoutsConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a builder for programmatic configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Base API URL for a device, e.g. `https://10.0.0.1/api/v2/`
    pub fn device_url(&self, address: Ipv4Addr) -> Result<Url> {
        let authority = match self.port {
            Some(port) => format!("{}:{}", address, port),
            None => address.to_string(),
        };
        let url = Url::parse(&format!("{}://{}{}", self.scheme, authority, API_PREFIX))?;
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.upload_ms)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Use plain HTTP instead of HTTPS
    pub fn plain_http(mut self) -> Self {
        self.config.scheme = "http".to_string();
        self
    }

    /// Set the management port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Disable certificate verification
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.config.insecure = insecure;
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Set upload timeout in milliseconds
    pub fn upload_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.upload_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
