//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

use crate::registry::RegistryConfig;
use crate::session::SessionConfig;

/// Default HTTP/websocket port
pub const DEFAULT_PORT: u16 = 8000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Viewer cap and outbound queue sizing
    pub registry: RegistryConfig,

    /// Flush threshold and storage cap
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            registry: RegistryConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set the session configuration
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the viewer cap per device
    pub fn max_viewers(mut self, max: usize) -> Self {
        self.registry = self.registry.max_viewers_per_device(max);
        self
    }

    /// Set the number of samples buffered before a flush
    pub fn flush_threshold(mut self, threshold: usize) -> Self {
        self.session = self.session.flush_threshold(threshold);
        self
    }

    /// Set the maximum stored array length
    pub fn storage_cap(mut self, cap: usize) -> Self {
        self.session = self.session.storage_cap(cap);
        self
    }
}
