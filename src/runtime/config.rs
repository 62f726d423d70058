//! Proxy configuration.

use crate::invoke::Target;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the local proxy server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Function every request is forwarded to.
    pub function_name: String,
    /// Alias or version of the function.
    pub qualifier: Option<String>,
    /// Base URI of the invoke endpoint.
    pub endpoint: String,
    /// Whether the function streams its responses.
    pub streaming: bool,
    /// Seconds allowed for the invocation, up to the response head.
    pub request_timeout: u64,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            function_name: String::new(),
            qualifier: None,
            endpoint: "http://127.0.0.1:9000".to_string(),
            streaming: false,
            request_timeout: 30,
            max_body_size: 6 * 1024 * 1024, // 6MB
        }
    }
}

impl ProxyConfig {
    /// Create a config forwarding to `function_name`.
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            ..Self::default()
        }
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Select an alias or version.
    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Set the invoke endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Stream responses instead of buffering them.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the request timeout in seconds.
    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = secs;
        self
    }

    /// Set the maximum request body size.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// The function requests are forwarded to.
    pub fn target(&self) -> Target {
        Target {
            function_name: self.function_name.clone(),
            qualifier: self.qualifier.clone(),
        }
    }
}
