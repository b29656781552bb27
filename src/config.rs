use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Lifetime shared by the signed token and the `token` cookie.
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Shared secrets gating the privileged roles.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleKeys {
    pub doctor: String,
    pub consultant: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub http_timeout_secs: u64,
    pub failure_redirect: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub role_keys: RoleKeys,
    pub google: GoogleConfig,
    pub smtp: Option<SmtpConfig>,
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "telehealth-auth".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "telehealth-users".into()),
        };

        let role_keys = RoleKeys {
            doctor: required("DOCTOR_KEY")?,
            consultant: required("CONSULTANT_KEY")?,
        };

        let google = GoogleConfig {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            callback_url: required("GOOGLE_CALLBACK_URL")?,
            http_timeout_secs: std::env::var("GOOGLE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
            failure_redirect: std::env::var("OAUTH_FAILURE_REDIRECT")
                .unwrap_or_else(|_| "/login".into()),
        };

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(465),
                username: std::env::var("SMTP_USER").ok(),
                password: std::env::var("SMTP_PASS").ok(),
                from: std::env::var("SMTP_FROM")
                    .or_else(|_| std::env::var("SMTP_USER"))
                    .context("SMTP_FROM or SMTP_USER must be set when SMTP_HOST is")?,
            }),
            _ => None,
        };

        let production = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            database_max_connections,
            jwt,
            role_keys,
            google,
            smtp,
            production,
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} is not set"))?;
    anyhow::ensure!(!value.trim().is_empty(), "{name} must not be empty");
    Ok(value)
}
