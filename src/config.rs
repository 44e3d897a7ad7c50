//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file by `dotenvy` in `main`.

use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_STATIC_DIR: &str = "client/build";
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for both the static client and the WebSocket endpoint
    pub port: u16,

    /// Directory holding the built browser client (`index.html` + assets)
    pub static_dir: String,

    /// Secret API key used as the bearer token for Stripe
    pub stripe_secret_key: String,

    /// Stripe API base URL, overridable for testing against a local mock
    pub stripe_api_base: String,
}

impl Config {
    /// Loads the configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `STRIPE_SECRET_KEY` - Stripe secret key (required)
    /// - `PORT` - Server port number (default: 5001)
    /// - `STATIC_DIR` - Client build directory (default: "client/build")
    /// - `STRIPE_API_BASE` - Stripe API base URL (default: "https://api.stripe.com")
    pub fn load() -> Result<Self, AppError> {
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Config("STRIPE_SECRET_KEY must be set".to_string()))?;

        Ok(Self {
            port: try_load("PORT", DEFAULT_PORT)?,
            static_dir: try_load("STATIC_DIR", DEFAULT_STATIC_DIR.to_string())?,
            stripe_secret_key,
            stripe_api_base: try_load("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE.to_string())?,
        })
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            AppError::Config(format!("invalid {key} value {raw:?}: {e}"))
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
