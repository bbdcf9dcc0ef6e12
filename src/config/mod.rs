use std::env;
use std::time::Duration;

use crate::settlement::SettlementConfig;

pub const DEFAULT_SLIPPAGE_TOLERANCE: f64 = 0.01;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Unset → in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    /// Bearer token for admin routes. Empty → admin auth disabled (dev mode).
    pub admin_token: Option<String>,

    // Settlement
    pub slippage_tolerance: f64,
    pub lock_timeout_ms: u64,
    pub max_commit_retries: u32,
    pub event_buffer: usize,

    // Telegram notifications (optional)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub notifications_enabled: bool,

    /// `json` switches the log formatter to JSON lines.
    pub log_format: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let slippage_tolerance: f64 = env::var("SLIPPAGE_TOLERANCE")
            .unwrap_or_else(|_| DEFAULT_SLIPPAGE_TOLERANCE.to_string())
            .parse()?;
        if !(slippage_tolerance.is_finite() && slippage_tolerance >= 0.0) {
            anyhow::bail!("SLIPPAGE_TOLERANCE must be a non-negative number");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            admin_token: env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty()),

            slippage_tolerance,
            lock_timeout_ms: env::var("LOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_LOCK_TIMEOUT_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS),
            max_commit_retries: env::var("MAX_COMMIT_RETRIES")
                .unwrap_or_else(|_| DEFAULT_MAX_COMMIT_RETRIES.to_string())
                .parse()
                .unwrap_or(DEFAULT_MAX_COMMIT_RETRIES),
            event_buffer: env::var("EVENT_BUFFER")
                .unwrap_or_else(|_| "256".into())
                .parse()
                .unwrap_or(256),

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").ok(),
            notifications_enabled: env::var("NOTIFICATIONS_ENABLED")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),

            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()),
        })
    }

    /// Configuration suitable for tests and local runs: in-memory store,
    /// no admin token, default settlement knobs.
    pub fn local() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            admin_token: None,
            slippage_tolerance: DEFAULT_SLIPPAGE_TOLERANCE,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            event_buffer: 256,
            telegram_bot_token: None,
            telegram_chat_id: None,
            notifications_enabled: false,
            log_format: "pretty".into(),
        }
    }

    /// Returns true if Telegram credentials are configured and enabled.
    pub fn has_telegram(&self) -> bool {
        self.notifications_enabled
            && self.telegram_bot_token.is_some()
            && self.telegram_chat_id.is_some()
    }

    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            slippage_tolerance: self.slippage_tolerance,
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            max_commit_retries: self.max_commit_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_defaults() {
        let c = AppConfig::local();
        assert!(c.database_url.is_none());
        assert!(!c.has_telegram());

        let s = c.settlement();
        assert_eq!(s.slippage_tolerance, 0.01);
        assert_eq!(s.lock_timeout, Duration::from_millis(2_000));
        assert_eq!(s.max_commit_retries, 3);
    }

    #[test]
    fn test_telegram_requires_flag_and_credentials() {
        let mut c = AppConfig::local();
        c.telegram_bot_token = Some("token".into());
        c.telegram_chat_id = Some("chat".into());
        assert!(!c.has_telegram());
        c.notifications_enabled = true;
        assert!(c.has_telegram());
    }
}
