//! Dev Server Descriptor: where the dev server listens and how it maps
//! request paths onto the output directory.

use crate::error::Error;
use crate::project::schema::{DevServerConfig, HistoryFallbackConfig};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 26386;
pub const DEFAULT_FALLBACK: &str = "index.html";

/// How a request path is answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "file", rename_all = "lowercase")]
pub enum DevResponse {
    /// Serve this file, relative to the output root.
    Static(String),
    /// Serve the single-page-application document.
    Fallback(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerDescriptor {
    pub host: String,
    pub port: u16,
    /// SPA fallback document, relative to the output root. `None` disables it.
    pub fallback: Option<String>,
}

impl Default for DevServerDescriptor {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            fallback: Some(DEFAULT_FALLBACK.to_string()),
        }
    }
}

impl DevServerDescriptor {
    #[must_use]
    pub fn from_config(config: &DevServerConfig) -> Self {
        let defaults = Self::default();
        let fallback = match &config.history_api_fallback {
            None | Some(HistoryFallbackConfig::Enabled(true)) => defaults.fallback,
            Some(HistoryFallbackConfig::Enabled(false)) => None,
            Some(HistoryFallbackConfig::Index { index }) => {
                Some(index.trim_start_matches('/').to_string())
            }
        };
        Self {
            host: config.host.clone().unwrap_or(defaults.host),
            port: config.port.unwrap_or(defaults.port),
            fallback,
        }
    }

    /// Socket address to bind. `localhost` binds the IPv4 loopback.
    pub fn bind_addr(&self) -> Result<SocketAddr, Error> {
        let ip: IpAddr = if self.host == "localhost" {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host.parse().map_err(|_| Error::InvalidOption {
                key: "devServer.host".to_string(),
                message: format!("'{}' is not an IP address", self.host),
            })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Decide how to answer a request for `path`.
    ///
    /// `exists` reports whether a file (relative to the output root) exists.
    /// Static files always win. The fallback document is served only for
    /// client-side routes, whose last segment has no extension.
    pub fn resolve_request(&self, path: &str, exists: impl Fn(&str) -> bool) -> DevResponse {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let relative = path.trim_start_matches('/');

        if relative.split('/').any(|seg| seg == ".." || seg == ".") {
            return DevResponse::NotFound;
        }

        let candidate = if relative.is_empty() || relative.ends_with('/') {
            format!("{relative}index.html")
        } else {
            relative.to_string()
        };
        if exists(&candidate) {
            return DevResponse::Static(candidate);
        }

        let last = relative.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        match &self.fallback {
            Some(index) if !last.contains('.') => DevResponse::Fallback(index.clone()),
            _ => DevResponse::NotFound,
        }
    }
}
