// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup and kept in memory.

use std::env;

/// Cloudflare R2 credentials and bucket.
#[derive(Debug, Clone)]
pub struct R2Config {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl R2Config {
    /// S3-compatible endpoint for the account.
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// Transactional email API settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// HTTPS endpoint accepting `{from, to, subject, text}` JSON
    pub api_url: String,
    pub api_key: String,
    /// Sender address, e.g. `Ucionica <noreply@ucionica.rs>`
    pub from: String,
}

/// Bank-transfer details printed on payment slips and invoices.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Primalac
    pub recipient: String,
    /// Adresa primaoca
    pub address: String,
    /// Račun primaoca
    pub account: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS and email links
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Emails allowed to bootstrap the admin role (lowercase)
    pub admin_emails: Vec<String>,
    /// Bank-transfer recipient details
    pub payment: PaymentConfig,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for email verification tokens
    pub email_token_key: Vec<u8>,
    /// R2 storage (None disables uploads and playback)
    pub r2: Option<R2Config>,
    /// Email API (None logs and drops outgoing mail)
    pub email: Option<EmailConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            payment: PaymentConfig {
                recipient: env::var("PAYMENT_RECIPIENT")
                    .unwrap_or_else(|_| "Učionica".to_string()),
                address: env::var("PAYMENT_ADDRESS").unwrap_or_else(|_| "Beograd".to_string()),
                account: env::var("PAYMENT_ACCOUNT")
                    .unwrap_or_else(|_| "000-0000000000000-00".to_string()),
            },

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            email_token_key: env::var("EMAIL_TOKEN_KEY")
                .map_err(|_| ConfigError::Missing("EMAIL_TOKEN_KEY"))?
                .into_bytes(),
            r2: load_r2()?,
            email: load_email()?,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            admin_emails: vec!["admin@example.com".to_string()],
            payment: PaymentConfig {
                recipient: "Učionica doo".to_string(),
                address: "Knez Mihailova 1, Beograd".to_string(),
                account: "160-0000000000000-00".to_string(),
            },
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            email_token_key: b"test_email_token_key".to_vec(),
            r2: None,
            email: None,
        }
    }

    /// Whether the given email may bootstrap the admin role.
    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// R2 settings are all-or-nothing.
fn load_r2() -> Result<Option<R2Config>, ConfigError> {
    let Ok(account_id) = env::var("R2_ACCOUNT_ID") else {
        return Ok(None);
    };

    Ok(Some(R2Config {
        account_id,
        access_key_id: env::var("R2_ACCESS_KEY_ID")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("R2_ACCESS_KEY_ID"))?,
        secret_access_key: env::var("R2_SECRET_ACCESS_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("R2_SECRET_ACCESS_KEY"))?,
        bucket: env::var("R2_BUCKET").map_err(|_| ConfigError::Missing("R2_BUCKET"))?,
    }))
}

fn load_email() -> Result<Option<EmailConfig>, ConfigError> {
    let Ok(api_url) = env::var("EMAIL_API_URL") else {
        return Ok(None);
    };

    Ok(Some(EmailConfig {
        api_url,
        api_key: env::var("EMAIL_API_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("EMAIL_API_KEY"))?,
        from: env::var("EMAIL_FROM").map_err(|_| ConfigError::Missing("EMAIL_FROM"))?,
    }))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("EMAIL_TOKEN_KEY", "test_email_key");
        env::set_var("ADMIN_EMAILS", " Admin@Example.com , ,owner@example.com");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.admin_emails,
            vec!["admin@example.com".to_string(), "owner@example.com".to_string()]
        );
        assert!(config.is_bootstrap_admin("ADMIN@example.com"));
        assert!(!config.is_bootstrap_admin("someone@example.com"));
    }

    #[test]
    fn test_r2_endpoint() {
        let r2 = R2Config {
            account_id: "abc123".to_string(),
            access_key_id: "k".to_string(),
            secret_access_key: "s".to_string(),
            bucket: "videos".to_string(),
        };
        assert_eq!(r2.endpoint_url(), "https://abc123.r2.cloudflarestorage.com");
    }
}
