use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domains::auth::jwt::DEFAULT_SESSION_TTL_HOURS;
use crate::kernel::{FileTokenStore, FlowSettings};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL for the profile store; profiles live in memory when unset
    pub database_url: Option<String>,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_verify_service_sid: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub session_ttl_hours: i64,
    /// Where the session token is kept between launches; not kept when unset
    pub session_file: Option<PathBuf>,
    /// Calling code offered by default on the phone entry screens
    pub default_calling_code: String,
    pub provider_timeout: Duration,
    pub resend_cooldown_secs: u32,
    pub test_identifier_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_verify_service_sid: env::var("TWILIO_VERIFY_SERVICE_SID")
                .context("TWILIO_VERIFY_SERVICE_SID must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "rider".to_string()),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| DEFAULT_SESSION_TTL_HOURS.to_string())
                .parse()
                .context("SESSION_TTL_HOURS must be a valid number")?,
            session_file: env::var("SESSION_FILE")
                .ok()
                .map(PathBuf::from)
                .or_else(FileTokenStore::default_path),
            default_calling_code: env::var("DEFAULT_CALLING_CODE")
                .unwrap_or_else(|_| "94".to_string()),
            provider_timeout: Duration::from_secs(
                env::var("PROVIDER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("PROVIDER_TIMEOUT_SECS must be a valid number")?,
            ),
            resend_cooldown_secs: env::var("RESEND_COOLDOWN_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("RESEND_COOLDOWN_SECS must be a valid number")?,
            test_identifier_enabled: env::var("TEST_IDENTIFIER_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            provider_timeout: self.provider_timeout,
            resend_cooldown_secs: self.resend_cooldown_secs,
        }
    }
}
