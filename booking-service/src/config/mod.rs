use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub booking: BookingConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Booking policy knobs.
#[derive(Deserialize, Clone, Debug)]
pub struct BookingConfig {
    /// Currency code for new checkout attempts (smallest-unit amounts).
    pub default_currency: String,
    /// Minimum lead time before slot start at which cancellation is allowed.
    pub cancel_cutoff_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("BOOKING_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("BOOKING_SERVICE_PORT")
            .unwrap_or_else(|_| "3005".to_string())
            .parse()?;

        let db_url = env::var("BOOKING_DATABASE_URL").expect("BOOKING_DATABASE_URL must be set");
        let max_connections = env::var("BOOKING_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("BOOKING_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
        let stripe_api_base_url = env::var("STRIPE_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());
        let stripe_success_url = env::var("STRIPE_SUCCESS_URL").unwrap_or_default();
        let stripe_cancel_url = env::var("STRIPE_CANCEL_URL").unwrap_or_default();

        let default_currency =
            env::var("BOOKING_DEFAULT_CURRENCY").unwrap_or_else(|_| "NPR".to_string());
        let cancel_cutoff_hours = env::var("BOOKING_CANCEL_CUTOFF_HOURS")
            .unwrap_or_else(|_| "12".to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            stripe: StripeConfig {
                secret_key: Secret::new(stripe_secret_key),
                webhook_secret: Secret::new(stripe_webhook_secret),
                api_base_url: stripe_api_base_url,
                success_url: stripe_success_url,
                cancel_url: stripe_cancel_url,
            },
            booking: BookingConfig {
                default_currency,
                cancel_cutoff_hours,
            },
            service_name: "booking-service".to_string(),
        })
    }
}
