use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::coordinator::PollSettings;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1";
const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
const DEFAULT_STALL_POLLS: u32 = 3;

/// Client configuration loaded from environment variables (and `.env`).
/// Every setting has a default; malformed values fail at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub poll_interval: Duration,
    pub stall_polls: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let poll_interval_ms = match lookup("MATCHER_POLL_INTERVAL_MS") {
            Some(raw) => parse_interval_ms(&raw)
                .context("MATCHER_POLL_INTERVAL_MS must be a positive number of milliseconds")?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };

        let stall_polls = match lookup("MATCHER_STALL_POLLS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("MATCHER_STALL_POLLS must be a non-negative integer")?,
            None => DEFAULT_STALL_POLLS,
        };

        Ok(Config {
            api_url: lookup("MATCHER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            stall_polls,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        api_url: Option<String>,
        poll_interval_ms: Option<u64>,
    ) -> Result<Self> {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        if let Some(ms) = poll_interval_ms {
            if ms == 0 {
                bail!("--poll-interval-ms must be greater than zero");
            }
            self.poll_interval = Duration::from_millis(ms);
        }
        Ok(self)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            stall_polls: self.stall_polls,
        }
    }
}

fn parse_interval_ms(raw: &str) -> Result<u64> {
    let ms = raw.trim().parse::<u64>()?;
    if ms == 0 {
        bail!("interval must be greater than zero");
    }
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.stall_polls, 3);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_environment_values() {
        let config = config(&[
            ("MATCHER_API_URL", "https://matcher.internal/api/v1"),
            ("MATCHER_POLL_INTERVAL_MS", "1500"),
            ("MATCHER_STALL_POLLS", "0"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://matcher.internal/api/v1");
        assert_eq!(config.poll_settings().interval, Duration::from_millis(1500));
        assert_eq!(config.poll_settings().stall_polls, 0);
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        for raw in ["0", "-5", "soon"] {
            let err = config(&[("MATCHER_POLL_INTERVAL_MS", raw)]).unwrap_err();
            assert!(err.to_string().contains("MATCHER_POLL_INTERVAL_MS"), "{raw}");
        }
    }

    #[test]
    fn test_overrides_win() {
        let config = config(&[("MATCHER_API_URL", "http://env")])
            .unwrap()
            .with_overrides(Some("http://flag".to_string()), Some(250))
            .unwrap();
        assert_eq!(config.api_url, "http://flag");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_interval_override_is_rejected() {
        assert!(config(&[]).unwrap().with_overrides(None, Some(0)).is_err());
    }
}
