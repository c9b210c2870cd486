use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, Result, bail};
use tracing::info;

/// Secrets that ship in sample files and must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "change-me", "dev-secret-change-me", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub reset_ttl_minutes: i64,
    pub token_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("PULSE_JWT_SECRET").context("PULSE_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim().to_lowercase().as_str()) {
            bail!("PULSE_JWT_SECRET is a placeholder value; set a real secret");
        }

        Ok(Self {
            host: try_load(&lookup, "PULSE_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PULSE_PORT", "3000")?,
            db_path: try_load(&lookup, "PULSE_DB_PATH", "pulse.db")?,
            jwt_secret,
            reset_ttl_minutes: try_load(&lookup, "PULSE_RESET_TTL_MINUTES", "60")?,
            token_ttl_days: try_load(&lookup, "PULSE_TOKEN_TTL_DAYS", "30")?,
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply() {
        let cfg = config(&[("PULSE_JWT_SECRET", "a-long-random-value")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, "pulse.db");
        assert_eq!(cfg.reset_ttl_minutes, 60);
        assert_eq!(cfg.token_ttl_days, 30);
    }

    #[test]
    fn test_secret_required_and_not_placeholder() {
        assert!(config(&[]).is_err());
        assert!(config(&[("PULSE_JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(config(&[("PULSE_JWT_SECRET", "  ChangeMe ")]).is_err());
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = config(&[("PULSE_JWT_SECRET", "x9"), ("PULSE_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PULSE_PORT"));
    }
}
