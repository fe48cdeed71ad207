//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::repos::MenuLimits;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "atrium";
const ENV_PREFIX: &str = "ATRIUM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_L1_TTL_SECS: u64 = 30;
const DEFAULT_L1_CAPACITY: u64 = 64;
const DEFAULT_L2_TTL_SECS: u64 = 300;
const DEFAULT_L2_TIMEOUT_MS: u64 = 250;
const DEFAULT_REDIS_POOL_SIZE: u32 = 8;
const DEFAULT_MENU_MAX_ENTRIES: u32 = 20;
const DEFAULT_MENU_MAX_CHILDREN: u32 = 10;
const DEFAULT_ROLE_HEADER: &str = "x-atrium-role";
const DEFAULT_ROLE_COOKIE: &str = "atrium_role";

/// Command-line arguments for the Atrium binary.
#[derive(Debug, Parser)]
#[command(name = "atrium", version, about = "Atrium menu service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ATRIUM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and administrative HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Delete every menu entry from the shared cache tier and exit.
    Purge(PurgeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub cache: CacheOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverride {
    /// Override the shared cache (Redis) URL.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub cache: CacheOverride,

    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the L1 cache TTL.
    #[arg(long = "cache-l1-ttl-seconds", value_name = "SECONDS")]
    pub cache_l1_ttl_seconds: Option<u64>,

    /// Override the L2 cache TTL.
    #[arg(long = "cache-l2-ttl-seconds", value_name = "SECONDS")]
    pub cache_l2_ttl_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub menu: MenuSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub l1_ttl: Duration,
    pub l1_capacity: NonZeroUsize,
    pub l2_ttl: Duration,
    pub l2_timeout: Duration,
    /// `None` runs the cache with L1 only.
    pub redis_url: Option<String>,
    pub redis_pool_size: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct MenuSettings {
    pub max_entries: NonZeroU32,
    pub max_children: NonZeroU32,
}

impl MenuSettings {
    pub fn limits(&self) -> MenuLimits {
        MenuLimits {
            entries: Some(self.max_entries.get()),
            children_per_entry: Some(self.max_children.get()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub role_header: String,
    pub role_cookie: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Purge(args)) => raw.apply_cache_override(&args.cache),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    menu: RawMenuSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(seconds) = overrides.cache_l1_ttl_seconds {
            self.cache.l1_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_l2_ttl_seconds {
            self.cache.l2_ttl_seconds = Some(seconds);
        }
        self.apply_cache_override(&overrides.cache);
    }

    fn apply_cache_override(&mut self, overrides: &CacheOverride) {
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            menu,
            auth,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            menu: build_menu_settings(menu)?,
            auth: build_auth_settings(auth)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }
    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "public and admin listeners must not share an address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let l1_ttl_secs = cache.l1_ttl_seconds.unwrap_or(DEFAULT_L1_TTL_SECS);
    if l1_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.l1_ttl_seconds",
            "must be greater than zero",
        ));
    }
    let l2_ttl_secs = cache.l2_ttl_seconds.unwrap_or(DEFAULT_L2_TTL_SECS);
    if l2_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.l2_ttl_seconds",
            "must be greater than zero",
        ));
    }
    let l2_timeout_ms = cache.l2_timeout_ms.unwrap_or(DEFAULT_L2_TIMEOUT_MS);
    if l2_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.l2_timeout_ms",
            "must be greater than zero",
        ));
    }

    let capacity = cache.l1_capacity.unwrap_or(DEFAULT_L1_CAPACITY);
    let l1_capacity = usize::try_from(capacity)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid("cache.l1_capacity", "must be a positive entry count")
        })?;

    let redis_url = non_blank(cache.redis_url);
    if let Some(url) = redis_url.as_deref() {
        let scheme_ok = url.starts_with("redis://")
            || url.starts_with("rediss://")
            || url.starts_with("redis+unix://");
        if !scheme_ok {
            return Err(LoadError::invalid(
                "cache.redis_url",
                "expected a redis://, rediss:// or redis+unix:// URL",
            ));
        }
    }

    let redis_pool_size = non_zero_u32(
        cache
            .redis_pool_size
            .unwrap_or(DEFAULT_REDIS_POOL_SIZE)
            .into(),
        "cache.redis_pool_size",
    )?;

    Ok(CacheSettings {
        l1_ttl: Duration::from_secs(l1_ttl_secs),
        l1_capacity,
        l2_ttl: Duration::from_secs(l2_ttl_secs),
        l2_timeout: Duration::from_millis(l2_timeout_ms),
        redis_url,
        redis_pool_size,
    })
}

fn build_menu_settings(menu: RawMenuSettings) -> Result<MenuSettings, LoadError> {
    Ok(MenuSettings {
        max_entries: non_zero_u32(
            menu.max_entries.unwrap_or(DEFAULT_MENU_MAX_ENTRIES).into(),
            "menu.max_entries",
        )?,
        max_children: non_zero_u32(
            menu.max_children.unwrap_or(DEFAULT_MENU_MAX_CHILDREN).into(),
            "menu.max_children",
        )?,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let role_header = non_blank(auth.role_header)
        .unwrap_or_else(|| DEFAULT_ROLE_HEADER.to_string())
        .to_ascii_lowercase();
    axum::http::HeaderName::from_str(&role_header).map_err(|err| {
        LoadError::invalid("auth.role_header", format!("invalid header name: {err}"))
    })?;

    let role_cookie =
        non_blank(auth.role_cookie).unwrap_or_else(|| DEFAULT_ROLE_COOKIE.to_string());
    if role_cookie.contains(['=', ';', ' ']) {
        return Err(LoadError::invalid(
            "auth.role_cookie",
            "cookie name must not contain `=`, `;` or spaces",
        ));
    }

    Ok(AuthSettings {
        role_header,
        role_cookie,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    l1_ttl_seconds: Option<u64>,
    l1_capacity: Option<u64>,
    l2_ttl_seconds: Option<u64>,
    l2_timeout_ms: Option<u64>,
    redis_url: Option<String>,
    redis_pool_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMenuSettings {
    max_entries: Option<u32>,
    max_children: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    role_header: Option<String>,
    role_cookie: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
