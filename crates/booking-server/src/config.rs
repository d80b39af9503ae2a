//! Server Configuration
//!
//! Everything is read once at start-up and handed to constructors.

use std::str::FromStr;
use std::time::Duration;

use booking_payments::{ChapaConfig, DispatcherConfig, LifecycleConfig, PaymentError, SmtpConfig};

/// Booking server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub bind_addr: String,
    /// Gateway credentials and endpoint
    pub chapa: ChapaConfig,
    /// Currency and callback host
    pub lifecycle: LifecycleConfig,
    /// Confirmation queue settings
    pub dispatcher: DispatcherConfig,
    /// SMTP relay (None = log mailer)
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let chapa = ChapaConfig::from_env()?;
        let lifecycle = LifecycleConfig::from_env()?;

        let defaults = DispatcherConfig::default();
        let dispatcher = DispatcherConfig {
            from_email: std::env::var("DEFAULT_FROM_EMAIL").unwrap_or(defaults.from_email),
            queue_size: parse_var("NOTIFICATION_QUEUE_SIZE", defaults.queue_size)?,
            max_attempts: parse_var("NOTIFICATION_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay: Duration::from_secs(parse_var(
                "NOTIFICATION_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )?),
        };

        Ok(Self {
            bind_addr,
            chapa,
            lifecycle,
            dispatcher,
            smtp: smtp_config(|name| std::env::var(name).ok())?,
        })
    }
}

/// Read `SMTP_*` settings. `None` when `SMTP_HOST` is unset or blank.
fn smtp_config(var: impl Fn(&str) -> Option<String>) -> Result<Option<SmtpConfig>, ConfigError> {
    let Some(host) = var("SMTP_HOST").filter(|h| !h.trim().is_empty()) else {
        return Ok(None);
    };

    let port = var("SMTP_PORT")
        .map(|p| p.trim().parse::<u16>().map_err(|_| ConfigError::Invalid("SMTP_PORT")))
        .transpose()?;

    Ok(Some(SmtpConfig {
        host,
        port,
        username: var("SMTP_USERNAME"),
        password: var("SMTP_PASSWORD"),
    }))
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Payments(#[from] PaymentError),
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_smtp_unset_host_means_log_mailer() {
        assert!(smtp_config(vars(&[])).unwrap().is_none());
        assert!(smtp_config(vars(&[("SMTP_HOST", " "), ("SMTP_PORT", "587")])).unwrap().is_none());
    }

    #[test]
    fn test_smtp_settings_are_read() {
        let smtp = smtp_config(vars(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USERNAME", "bookings"),
            ("SMTP_PASSWORD", "hunter2"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, Some(587));
        assert_eq!(smtp.username.as_deref(), Some("bookings"));
    }

    #[test]
    fn test_unparsable_smtp_port_is_rejected() {
        for port in ["abc", "70000", ""] {
            let err = smtp_config(vars(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_PORT", port)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid("SMTP_PORT")));
        }
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: usize = parse_var("BOOKING_TEST_UNSET_QUEUE_SIZE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
