//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS, TokenDurations};
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Proxy header carrying the client IP. Only read when configured, since
/// clients can send any of these themselves.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpHeader {
    /// Last entry of `X-Forwarded-For`, the one appended by the proxy
    XForwardedFor,
    XRealIp,
    CfConnectingIp,
}

impl IpHeader {
    pub fn header_name(&self) -> &'static str {
        match self {
            IpHeader::XForwardedFor => "x-forwarded-for",
            IpHeader::XRealIp => "x-real-ip",
            IpHeader::CfConnectingIp => "cf-connecting-ip",
        }
    }

    /// Parse the client IP out of a header value.
    pub fn extract(&self, value: &str) -> Result<String, &'static str> {
        let candidate = match self {
            IpHeader::XForwardedFor => value.rsplit(',').next().unwrap_or(value),
            IpHeader::XRealIp | IpHeader::CfConnectingIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "boardgate",
    about = "Forum boards with cookie sessions and per-board permissions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "BOARDGATE_PORT", default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "BOARDGATE_DATABASE", default_value = "boardgate.db")]
    pub database: String,

    /// Public origin of the server (e.g., "https://forum.example.com"). Used as
    /// the token issuer; an https origin enables Secure cookies
    #[arg(long, env = "BOARDGATE_ORIGIN", default_value = "http://localhost:7291")]
    pub origin: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_ttl: u64,

    /// Trusted proxy header to read the client IP from. Without it, rate
    /// limits key on the socket address
    #[arg(long, env = "BOARDGATE_IP_HEADER")]
    pub ip_header: Option<IpHeader>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    check_jwt_secret(secret)
}

fn check_jwt_secret(secret: String) -> Option<String> {
    if secret.chars().count() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Parse and validate the origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_origin(origin: &str) -> Option<Url> {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Token lifetimes from the TTL arguments. A refresh lifetime shorter than the
/// access lifetime is raised to match it.
pub fn token_durations(access_ttl: u64, refresh_ttl: u64) -> TokenDurations {
    TokenDurations {
        access: access_ttl,
        refresh: refresh_ttl.max(access_ttl),
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    origin: Url,
    jwt_secret: String,
    token_durations: TokenDurations,
    ip_header: Option<IpHeader>,
) -> ServerConfig {
    let secure_cookies = origin.scheme() == "https";

    ServerConfig {
        db,
        issuer: origin.origin().ascii_serialization(),
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies,
        token_durations,
        rate_limit: Arc::new(RateLimitConfig::new().with_ip_header(ip_header)),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
