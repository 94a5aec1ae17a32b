//! Configuration management

use aide_common::media::{ExtensionSet, MimeTypeSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/aide";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Inventory Configuration Constants
// ============================================================================

/// Default static root of the file server; project images live in
/// `<root>/<project>`.
pub const DEFAULT_FILES_ROOT: &str = "/srv/aide/files";

/// Default directory depth walked by a scan.
pub const DEFAULT_MAX_SCAN_DEPTH: usize = crate::inventory::scanner::DEFAULT_MAX_SCAN_DEPTH;

/// Default scan timeout in seconds.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 300;

/// Default number of images returned by a listing without a limit.
pub const DEFAULT_LIST_LIMIT: i64 = 1_000;

/// Hard cap on images returned by one listing.
pub const DEFAULT_LIST_MAX_LIMIT: i64 = 100_000;

/// Default listing query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Default rows per bulk insert statement.
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = crate::db::postgres::DEFAULT_INSERT_CHUNK_SIZE;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub files: FilesConfig,
    pub inventory: InventoryConfig,
    pub auth: AuthConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Image file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    pub root: PathBuf,
    pub image_extensions: Vec<String>,
    pub image_mime_types: Vec<String>,
    pub max_scan_depth: usize,
    pub scan_timeout_secs: u64,
}

/// Inventory query and ingestion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub list_default_limit: i64,
    pub list_max_limit: i64,
    pub query_timeout_secs: u64,
    pub insert_chunk_size: usize,
}

/// Access control configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token granting admin access. Never serialized.
    #[serde(skip_serializing, default)]
    pub admin_token: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(value) => value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("AIDE_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("AIDE_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "AIDE_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS", &[DEFAULT_CORS_ALLOWED_ORIGIN]),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
            files: FilesConfig {
                root: std::env::var("AIDE_FILES_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_FILES_ROOT)),
                image_extensions: env_list(
                    "AIDE_IMAGE_EXTENSIONS",
                    aide_common::media::DEFAULT_IMAGE_EXTENSIONS,
                ),
                image_mime_types: env_list(
                    "AIDE_IMAGE_MIME_TYPES",
                    aide_common::media::DEFAULT_IMAGE_MIME_TYPES,
                ),
                max_scan_depth: env_or("AIDE_MAX_SCAN_DEPTH", DEFAULT_MAX_SCAN_DEPTH),
                scan_timeout_secs: env_or("AIDE_SCAN_TIMEOUT", DEFAULT_SCAN_TIMEOUT_SECS),
            },
            inventory: InventoryConfig {
                list_default_limit: env_or("AIDE_LIST_DEFAULT_LIMIT", DEFAULT_LIST_LIMIT),
                list_max_limit: env_or("AIDE_LIST_MAX_LIMIT", DEFAULT_LIST_MAX_LIMIT),
                query_timeout_secs: env_or("AIDE_QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT_SECS),
                insert_chunk_size: env_or("AIDE_INSERT_CHUNK_SIZE", DEFAULT_INSERT_CHUNK_SIZE),
            },
            auth: AuthConfig {
                admin_token: std::env::var("AIDE_ADMIN_TOKEN")
                    .ok()
                    .filter(|token| !token.trim().is_empty()),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate connection pool settings
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        // Validate media allow-lists
        self.image_extensions()?;
        self.image_mime_types()?;

        if self.files.max_scan_depth == 0 {
            anyhow::bail!("Maximum scan depth must be greater than 0");
        }

        // Validate listing limits
        if self.inventory.list_default_limit < 1 {
            anyhow::bail!("Default list limit must be greater than 0");
        }

        if self.inventory.list_default_limit > self.inventory.list_max_limit {
            anyhow::bail!(
                "Default list limit ({}) cannot be greater than the maximum ({})",
                self.inventory.list_default_limit,
                self.inventory.list_max_limit
            );
        }

        if self.inventory.insert_chunk_size == 0 {
            anyhow::bail!("Insert chunk size must be greater than 0");
        }

        // Validate CORS origins
        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        if self.auth.admin_token.is_none() {
            tracing::warn!("AIDE_ADMIN_TOKEN is not set - all image routes will be refused");
        }

        Ok(())
    }

    pub fn image_extensions(&self) -> aide_common::Result<ExtensionSet> {
        ExtensionSet::new(&self.files.image_extensions)
    }

    pub fn image_mime_types(&self) -> aide_common::Result<MimeTypeSet> {
        MimeTypeSet::new(&self.files.image_mime_types)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_FILES_ROOT),
            image_extensions: aide_common::media::DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            image_mime_types: aide_common::media::DEFAULT_IMAGE_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            list_default_limit: DEFAULT_LIST_LIMIT,
            list_max_limit: DEFAULT_LIST_MAX_LIMIT,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            insert_chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
        }
    }
}
