use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub portal: PortalConfig,
    pub delivery: DeliveryConfig,
}

const DEFAULT_RESUME_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_RESUME_EMAILS_PER_HOUR: u32 = 5;

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::from_str(&env::var("APP_LOG_FORMAT").unwrap_or_default());

        let public_base_url = env::var("PORTAL_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let resume_token_ttl_hours = match env::var("RESUME_TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::InvalidNumber {
                    key: "RESUME_TOKEN_TTL_HOURS",
                })?,
            Err(_) => DEFAULT_RESUME_TOKEN_TTL_HOURS,
        };

        let resume_emails_per_hour = match env::var("RESUME_EMAILS_PER_HOUR") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "RESUME_EMAILS_PER_HOUR",
                })?,
            Err(_) => DEFAULT_RESUME_EMAILS_PER_HOUR,
        };

        let operator_key = non_empty_var("OPERATOR_KEY");

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            portal: PortalConfig {
                public_base_url,
                resume_token_ttl_hours,
                resume_emails_per_hour,
                operator_key,
            },
            delivery: DeliveryConfig {
                email_provider: non_empty_var("EMAIL_PROVIDER"),
                sms_provider: non_empty_var("SMS_PROVIDER"),
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Client portal behavior: resume links, throttling, and the operator key.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub public_base_url: String,
    pub resume_token_ttl_hours: i64,
    pub resume_emails_per_hour: u32,
    pub operator_key: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1:3000".to_string(),
            resume_token_ttl_hours: DEFAULT_RESUME_TOKEN_TTL_HOURS,
            resume_emails_per_hour: DEFAULT_RESUME_EMAILS_PER_HOUR,
            operator_key: None,
        }
    }
}

/// Outbound delivery providers. `None` means no provider is wired up.
#[derive(Debug, Clone, Default)]
pub struct DeliveryConfig {
    pub email_provider: Option<String>,
    pub sms_provider: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "PORTAL_BASE_URL",
            "RESUME_TOKEN_TTL_HOURS",
            "RESUME_EMAILS_PER_HOUR",
            "OPERATOR_KEY",
            "EMAIL_PROVIDER",
            "SMS_PROVIDER",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.portal.public_base_url, "http://127.0.0.1:3000");
        assert_eq!(config.portal.resume_token_ttl_hours, 24);
        assert_eq!(config.portal.resume_emails_per_hour, 5);
        assert!(config.portal.operator_key.is_none());
        assert!(config.delivery.email_provider.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn portal_settings_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PORTAL_BASE_URL", "https://probate.example.ca/");
        env::set_var("RESUME_TOKEN_TTL_HOURS", "48");
        env::set_var("OPERATOR_KEY", "  ops-secret ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.portal.public_base_url, "https://probate.example.ca");
        assert_eq!(config.portal.resume_token_ttl_hours, 48);
        assert_eq!(config.portal.operator_key.as_deref(), Some("ops-secret"));
        reset_env();
    }

    #[test]
    fn rejects_non_positive_token_ttl() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RESUME_TOKEN_TTL_HOURS", "0");
        let err = AppConfig::load().expect_err("zero ttl rejected");
        assert!(err.to_string().contains("RESUME_TOKEN_TTL_HOURS"));
        reset_env();
    }
}
