//! Configuration for the CRM service.

use std::env;
use std::time::Duration;

/// Placeholder shipped in sample env files; treated as "not configured".
pub const PLACEHOLDER_SECRET: &str = "change-me-in-production";

/// CRM service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// sqlx database URL.
    pub database_url: String,
    /// HMAC secret used to sign access tokens.
    pub secret_key: String,
    /// Access token lifetime in minutes.
    pub access_token_expire_minutes: i64,
    /// Allowed CORS origins (`*` allows any).
    pub cors_origins: Vec<String>,
    /// Token expected in `X-API-Token` on the external intake endpoints.
    pub external_api_token: String,
    /// Bearer token expected on inbound webhooks.
    pub webhook_secret: Option<String>,
    /// Legacy Grok key used when no AI configuration row is active.
    pub grok_api_key: Option<String>,
    /// Webhook follow-up polling.
    pub lead_followup: LeadFollowupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://crm.db?mode=rwc".to_string()),
            secret_key: env::var("SECRET_KEY").unwrap_or_else(|_| PLACEHOLDER_SECRET.to_string()),
            access_token_expire_minutes: env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1440),
            cors_origins: env::var("CORS_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]),
            external_api_token: env::var("EXTERNAL_API_TOKEN")
                .unwrap_or_else(|_| PLACEHOLDER_SECRET.to_string()),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            grok_api_key: env::var("GROK_API_KEY").ok().filter(|s| !s.is_empty()),
            lead_followup: LeadFollowupConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Webhook secret, unless unset or left at the placeholder.
    #[must_use]
    pub fn effective_webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|s| *s != PLACEHOLDER_SECRET)
    }
}

/// Polling used after a webhook lead arrives, waiting for its analysis.
#[derive(Debug, Clone)]
pub struct LeadFollowupConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for LeadFollowupConfig {
    fn default() -> Self {
        Self {
            attempts: env::var("LEAD_FOLLOWUP_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(12),
            interval: Duration::from_secs(
                env::var("LEAD_FOLLOWUP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PORT",
        "DATABASE_URL",
        "SECRET_KEY",
        "ACCESS_TOKEN_EXPIRE_MINUTES",
        "CORS_ORIGINS",
        "EXTERNAL_API_TOKEN",
        "WEBHOOK_SECRET",
        "GROK_API_KEY",
        "LEAD_FOLLOWUP_ATTEMPTS",
        "LEAD_FOLLOWUP_INTERVAL_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = Config::from_env();
        assert_eq!(config.port, 8000);
        assert_eq!(config.access_token_expire_minutes, 1440);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.external_api_token, PLACEHOLDER_SECRET);
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.lead_followup.attempts, 12);
        assert_eq!(config.lead_followup.interval, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("PORT", "9100");
        env::set_var("CORS_ORIGINS", "https://crm.example.com, https://app.example.com,");
        env::set_var("ACCESS_TOKEN_EXPIRE_MINUTES", "30");
        env::set_var("WEBHOOK_SECRET", "s3cret");

        let config = Config::from_env();
        assert_eq!(config.port, 9100);
        assert_eq!(
            config.cors_origins,
            vec!["https://crm.example.com", "https://app.example.com"]
        );
        assert_eq!(config.access_token_expire_minutes, 30);
        assert_eq!(config.effective_webhook_secret(), Some("s3cret"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_placeholder_webhook_secret_disables_check() {
        clear_env();
        env::set_var("WEBHOOK_SECRET", PLACEHOLDER_SECRET);

        let config = Config::from_env();
        assert!(config.webhook_secret.is_some());
        assert!(config.effective_webhook_secret().is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_fall_back() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        env::set_var("LEAD_FOLLOWUP_ATTEMPTS", "-3");

        let config = Config::from_env();
        assert_eq!(config.port, 8000);
        assert_eq!(config.lead_followup.attempts, 12);

        clear_env();
    }
}
