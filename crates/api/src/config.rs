//! Process configuration read from the environment (and `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use tillpoint_core::TenantId;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 480;

/// Tenant used when `TILLPOINT_TENANT_ID` is not set. The deployment serves one shop.
pub const DEFAULT_TENANT: Uuid = Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid socket address: {value}")]
    BindAddr { key: &'static str, value: String },

    #[error("{key} must be a positive number of minutes, got {value}")]
    TokenTtl { key: &'static str, value: String },

    #[error("{key} is not a valid tenant id: {value}")]
    TenantId { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub journal_path: Option<PathBuf>,
    pub tenant_id: TenantId,
    pub admin_username: String,
    pub admin_password: String,
    pub token_ttl_minutes: i64,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("TILLPOINT_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::BindAddr {
            key: "TILLPOINT_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let token_ttl_minutes = match get("TILLPOINT_TOKEN_TTL_MINUTES") {
            None => DEFAULT_TOKEN_TTL_MINUTES,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::TokenTtl {
                        key: "TILLPOINT_TOKEN_TTL_MINUTES",
                        value: raw,
                    });
                }
            },
        };

        let tenant_id = match get("TILLPOINT_TENANT_ID") {
            None => TenantId::from(DEFAULT_TENANT),
            Some(raw) => raw.parse().map_err(|_| ConfigError::TenantId {
                key: "TILLPOINT_TENANT_ID",
                value: raw,
            })?,
        };

        let admin_username = get("TILLPOINT_ADMIN_USERNAME").unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());
        let admin_password = get("TILLPOINT_ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

        Ok(Self {
            bind_addr,
            jwt_secret: get("TILLPOINT_JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            journal_path: get("TILLPOINT_JOURNAL_PATH").map(PathBuf::from),
            tenant_id,
            admin_username,
            admin_password,
            token_ttl_minutes,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// In-memory, test-friendly settings.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.to_string(),
            journal_path: None,
            tenant_id: TenantId::from(DEFAULT_TENANT),
            admin_username: DEFAULT_ADMIN_USERNAME.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert!(cfg.uses_default_secret());
        assert_eq!(cfg.journal_path, None);
        assert_eq!(cfg.admin_username, "admin");
        assert_eq!(cfg.token_ttl_minutes, 480);
        assert_eq!(cfg.tenant_id, TenantId::from(DEFAULT_TENANT));
    }

    #[test]
    fn explicit_values_win_and_blanks_are_ignored() {
        let cfg = load(&[
            ("TILLPOINT_BIND_ADDR", "127.0.0.1:9000"),
            ("TILLPOINT_JWT_SECRET", "s3cret"),
            ("TILLPOINT_JOURNAL_PATH", "/var/lib/till/events.jsonl"),
            ("TILLPOINT_TOKEN_TTL_MINUTES", "60"),
            ("TILLPOINT_ADMIN_USERNAME", "   "),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert!(!cfg.uses_default_secret());
        assert_eq!(cfg.journal_path, Some(PathBuf::from("/var/lib/till/events.jsonl")));
        assert_eq!(cfg.token_ttl_minutes, 60);
        assert_eq!(cfg.admin_username, "admin");
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            load(&[("TILLPOINT_BIND_ADDR", "nowhere")]),
            Err(ConfigError::BindAddr { .. })
        ));
        assert!(matches!(
            load(&[("TILLPOINT_TOKEN_TTL_MINUTES", "0")]),
            Err(ConfigError::TokenTtl { .. })
        ));
        assert!(matches!(
            load(&[("TILLPOINT_TENANT_ID", "shop-1")]),
            Err(ConfigError::TenantId { .. })
        ));
    }
}
