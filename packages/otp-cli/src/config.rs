use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use maherkar_client::{MaherkarOptions, DEFAULT_BASE_URL};
use otp_flow::{check_window_seconds, FlowConfig, DEFAULT_WINDOW_SECONDS};

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub auth_url: String,
    pub window_seconds: u64,
    pub store_path: PathBuf,
    pub show_debug_code: bool,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            auth_url: env::var("MAHERKAR_AUTH_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            window_seconds: parse_window_seconds(
                &env::var("OTP_WINDOW_SECONDS")
                    .unwrap_or_else(|_| DEFAULT_WINDOW_SECONDS.to_string()),
            )
            .context("OTP_WINDOW_SECONDS is invalid")?,
            store_path: match env::var("OTP_STORE_PATH") {
                Ok(path) => PathBuf::from(path),
                Err(_) => default_store_path()?,
            },
            show_debug_code: env::var("OTP_SHOW_DEBUG_CODE")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            http_timeout: Duration::from_secs(
                env::var("MAHERKAR_HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("MAHERKAR_HTTP_TIMEOUT_SECS must be a valid number")?,
            ),
        })
    }

    /// Override the resend window, rejecting values outside the allowed range.
    pub fn set_window_seconds(&mut self, window_seconds: u64) -> Result<()> {
        self.window_seconds =
            check_window_seconds(window_seconds).context("--window-seconds is invalid")?;
        Ok(())
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig::default().with_window_seconds(self.window_seconds)
    }

    pub fn client_options(&self) -> MaherkarOptions {
        MaherkarOptions {
            base_url: self.auth_url.clone(),
            timeout: self.http_timeout,
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join("maherkar").join("otp-store.json"))
        .context("could not determine a data directory; set OTP_STORE_PATH")
}

fn parse_window_seconds(value: &str) -> Result<u64> {
    let seconds: u64 = value.trim().parse().context("must be a whole number of seconds")?;
    Ok(check_window_seconds(seconds)?)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_parse_window_seconds() {
        assert_eq!(parse_window_seconds("90").unwrap(), 90);
        assert_eq!(parse_window_seconds(" 120 ").unwrap(), 120);
        assert!(parse_window_seconds("0").is_err());
        assert!(parse_window_seconds("86401").is_err());
        assert!(parse_window_seconds("18446744073709551615").is_err());
        assert!(parse_window_seconds("two minutes").is_err());
    }

    #[test]
    fn test_flow_config_uses_window() {
        let mut config = Config {
            auth_url: DEFAULT_BASE_URL.to_string(),
            window_seconds: 60,
            store_path: PathBuf::from("store.json"),
            show_debug_code: false,
            http_timeout: Duration::from_secs(15),
        };
        assert_eq!(config.flow_config().window_seconds, 60);
        assert_eq!(config.client_options().base_url, DEFAULT_BASE_URL);

        assert!(config.set_window_seconds(u64::MAX).is_err());
        assert_eq!(config.window_seconds, 60);
        config.set_window_seconds(300).unwrap();
        assert_eq!(config.flow_config().window_seconds, 300);
    }
}
