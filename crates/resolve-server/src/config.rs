use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use resolve_engine::EscalationPolicy;
use resolve_engine::sweeper::DEFAULT_SENIOR_ADMIN_EMAIL;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub sweep_interval: Duration,
    pub sla_hours: i64,
    pub senior_admin_email: String,
    pub bootstrap_admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("RESOLVE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("RESOLVE_JWT_SECRET is unset or still a placeholder");
        }

        let port = match get("RESOLVE_PORT") {
            Some(raw) => raw.parse().context("RESOLVE_PORT must be a port number")?,
            None => 8080,
        };
        let sweep_secs: u64 = match get("RESOLVE_SWEEP_INTERVAL_SECS") {
            Some(raw) => raw
                .parse()
                .context("RESOLVE_SWEEP_INTERVAL_SECS must be a whole number of seconds")?,
            None => 3600,
        };
        if sweep_secs == 0 {
            bail!("RESOLVE_SWEEP_INTERVAL_SECS must be positive");
        }
        let sla_hours: i64 = match get("RESOLVE_SLA_HOURS") {
            Some(raw) => raw
                .parse()
                .context("RESOLVE_SLA_HOURS must be a whole number of hours")?,
            None => 48,
        };
        if sla_hours <= 0 {
            bail!("RESOLVE_SLA_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path: get("RESOLVE_DB_PATH")
                .unwrap_or_else(|| "resolveit.db".into())
                .into(),
            host: get("RESOLVE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            upload_dir: get("RESOLVE_UPLOAD_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            sweep_interval: Duration::from_secs(sweep_secs),
            sla_hours,
            senior_admin_email: get("RESOLVE_SENIOR_ADMIN_EMAIL")
                .unwrap_or_else(|| DEFAULT_SENIOR_ADMIN_EMAIL.into()),
            bootstrap_admin_email: get("RESOLVE_BOOTSTRAP_ADMIN_EMAIL")
                .filter(|e| !e.trim().is_empty()),
        })
    }

    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            sla: chrono::Duration::hours(self.sla_hours),
            senior_admin_email: self.senior_admin_email.clone(),
        }
    }
}
