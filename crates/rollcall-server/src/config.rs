use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub reminder_interval_secs: u64,
    /// Seeded on startup when both are set.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("ROLLCALL_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ROLLCALL_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = match get("ROLLCALL_PORT") {
            Some(v) => v.parse().with_context(|| format!("Invalid ROLLCALL_PORT '{}'", v))?,
            None => 3000,
        };
        let reminder_interval_secs = match get("ROLLCALL_REMINDER_INTERVAL_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid ROLLCALL_REMINDER_INTERVAL_SECS '{}'", v))?,
            None => 3600,
        };
        if reminder_interval_secs == 0 {
            bail!("ROLLCALL_REMINDER_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            jwt_secret,
            db_path: get("ROLLCALL_DB_PATH").unwrap_or_else(|| "rollcall.db".into()).into(),
            host: get("ROLLCALL_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            reminder_interval_secs,
            admin_username: get("ROLLCALL_ADMIN_USERNAME"),
            admin_password: get("ROLLCALL_ADMIN_PASSWORD"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("ROLLCALL_JWT_SECRET", "s3cr3t")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("rollcall.db"));
        assert_eq!(config.reminder_interval_secs, 3600);
        assert!(config.admin_username.is_none());
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("ROLLCALL_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let vars = [("ROLLCALL_JWT_SECRET", "s3cr3t"), ("ROLLCALL_PORT", "eighty")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());
        let vars = [("ROLLCALL_JWT_SECRET", "s3cr3t"), ("ROLLCALL_REMINDER_INTERVAL_SECS", "0")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
