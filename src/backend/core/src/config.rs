//! Configuration management.

use serde::Deserialize;

use crate::telemetry::TelemetryConfig;

/// Main toolkit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolkitConfig {
    /// HTTP server configuration (demo binary)
    #[serde(default)]
    pub server: ServerConfig,

    /// Pagination limits
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Access-control settings
    #[serde(default)]
    pub rbac: RbacConfig,

    /// Logging and metrics
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when a request does not specify one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Largest page size accepted from clients
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    /// Name of the bootstrap role that holds every permission
    #[serde(default = "default_super_admin_role")]
    pub super_admin_role: String,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            super_admin_role: default_super_admin_role(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_page_size() -> u64 { crate::pagination::DEFAULT_PAGE_SIZE }
fn default_max_page_size() -> u64 { crate::pagination::MAX_PAGE_SIZE }
fn default_super_admin_role() -> String { crate::rbac::SUPER_ADMIN_ROLE.to_string() }

impl ToolkitConfig {
    /// Load configuration from `config/default.*` (optional) and `TOOLKIT__*`
    /// environment variables.
    pub fn load() -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("TOOLKIT").separator("__"))
            .build()?;

        let cfg: ToolkitConfig = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TOOLKIT").separator("__"))
            .build()?;

        let cfg: ToolkitConfig = config.try_deserialize()?;
        Ok(cfg)
    }
}
