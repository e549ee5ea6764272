//! Runtime configuration for Medora.
//!
//! All settings are resolved once at startup from environment variables
//! (optionally loaded from a `.env` file) and handed to the services at
//! construction.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};

/// Fallback signing secret for development setups without a configured one.
const DEV_JWT_SECRET: &str = "medora-dev-secret";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Path of the SQLite database file.
    pub database_path: String,
    /// Secret used to sign and verify session tokens.
    pub jwt_secret: String,
    /// Migration flag: accept legacy plaintext credentials on login.
    /// Matching accounts are re-hashed on their first successful login.
    pub allow_plaintext_passwords: bool,
}

impl Settings {
    /// Reads the settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `MEDORA_HOST`/`MEDORA_PORT` do not form a valid
    /// socket address.
    pub fn from_env() -> Result<Self> {
        let host = env::var("MEDORA_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("MEDORA_PORT").unwrap_or_else(|_| "5000".to_string());
        let bind_addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid bind address {host}:{port}"))?;

        let database_path = env::var("MEDORA_DB").unwrap_or_else(|_| "medora.db".to_string());

        let jwt_secret = match env::var("MEDORA_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("MEDORA_JWT_SECRET is not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let allow_plaintext_passwords = env::var("MEDORA_ALLOW_PLAINTEXT_PASSWORDS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if allow_plaintext_passwords {
            tracing::warn!("legacy plaintext password comparison is enabled");
        }

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret,
            allow_plaintext_passwords,
        })
    }
}
