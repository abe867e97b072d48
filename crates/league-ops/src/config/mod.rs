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
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub payments: PaymentConfig,
    pub invoicing: InvoiceConfig,
}

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

        let membership_fee_cents = env::var("APP_MEMBERSHIP_FEE_CENTS")
            .unwrap_or_else(|_| "15000".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidFee)?;
        let currency = env::var("APP_CURRENCY").unwrap_or_else(|_| "EUR".to_string());
        let webhook_secret =
            env::var("APP_WEBHOOK_SECRET").unwrap_or_else(|_| "whsec_local_dev".to_string());
        let checkout_success_url = env::var("APP_CHECKOUT_SUCCESS_URL")
            .unwrap_or_else(|_| "http://localhost:3000/checkout/success".to_string());
        let checkout_cancel_url = env::var("APP_CHECKOUT_CANCEL_URL")
            .unwrap_or_else(|_| "http://localhost:3000/checkout/cancel".to_string());

        // Invoicing stays dark until explicitly switched on.
        let invoicing_enabled = env::var("APP_INVOICING_ENABLED")
            .map(|raw| {
                matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
            })
            .unwrap_or(false);
        let vat_rate_percent = env::var("APP_VAT_RATE_PERCENT")
            .unwrap_or_else(|_| "27".to_string())
            .parse::<u8>()
            .ok()
            .filter(|rate| *rate <= 100)
            .ok_or(ConfigError::InvalidVatRate)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            payments: PaymentConfig {
                membership_fee_cents,
                currency,
                webhook_secret,
                checkout_success_url,
                checkout_cancel_url,
            },
            invoicing: InvoiceConfig {
                enabled: invoicing_enabled,
                vat_rate_percent,
            },
        })
    }
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
}

/// Membership fee and hosted-checkout settings for the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub membership_fee_cents: u32,
    pub currency: String,
    pub webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
}

/// Fiscal invoicing controls. Disabled by default; the orchestrator skips
/// issuance entirely while the flag is off.
#[derive(Debug, Clone)]
pub struct InvoiceConfig {
    pub enabled: bool,
    pub vat_rate_percent: u8,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFee,
    InvalidVatRate,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFee => {
                write!(f, "APP_MEMBERSHIP_FEE_CENTS must be a whole number of cents")
            }
            ConfigError::InvalidVatRate => {
                write!(
                    f,
                    "APP_VAT_RATE_PERCENT must be an integer percentage up to 100"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
