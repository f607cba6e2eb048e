use crate::error::{AppError, Result};

/// A price change deviating more than this fraction from the current price
/// requires explicit confirmation before it commits.
pub const VOLATILITY_THRESHOLD: f64 = 0.5;

/// Prefixes a listing price may already carry. Anything else gets
/// CURRENCY_PREFIX prepended on create/update.
pub const ACCEPTED_CURRENCY_PREFIXES: &[&str] = &["GH₵", "₵"];
pub const CURRENCY_PREFIX: &str = "GH₵";

/// Listing fan-out reconciler interval (seconds). Re-running the fan-out is
/// idempotent, so the interval only bounds how long a missed propagation can
/// stay stale.
pub const RECONCILE_INTERVAL_SECS: u64 = 300;

/// Capacity of the store's change-event broadcast channel. A lagged observer
/// re-runs its query, so overflow loses no data.
pub const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Synthesized profile defaults for identities that never saved a profile.
pub const DEFAULT_NAME: &str = "Farmer";
pub const DEFAULT_LOCATION: &str = "Ghana";

/// What logging out does to locally persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutPolicy {
    /// Drop the session but keep local data (account switching).
    SoftSignOut,
    /// Clear every local collection along with the session.
    FullWipe,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// LOGOUT_POLICY: "wipe" or "soft".
    pub logout_policy: LogoutPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "agrihub.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            logout_policy: match std::env::var("LOGOUT_POLICY")
                .unwrap_or_else(|_| "wipe".to_string())
                .as_str()
            {
                "wipe" => LogoutPolicy::FullWipe,
                "soft" => LogoutPolicy::SoftSignOut,
                other => {
                    return Err(AppError::Config(format!(
                        "LOGOUT_POLICY must be \"wipe\" or \"soft\", got {other:?}"
                    )))
                }
            },
        })
    }
}
