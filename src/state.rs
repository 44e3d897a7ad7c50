//! Application state shared across all request handlers

use std::sync::Arc;

use crate::config::Config;
use crate::stripe::{PromotionCodes, StripeClient};

/// Wraps the configuration and the promotion code API in `Arc`s so every
/// WebSocket connection can hold its own cheap clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stripe: Arc<dyn PromotionCodes>,
}

impl AppState {
    /// Builds the production state backed by the real Stripe API
    pub fn from_config(config: Config) -> Self {
        let stripe = StripeClient::new(&config.stripe_api_base, &config.stripe_secret_key);
        Self {
            config: Arc::new(config),
            stripe: Arc::new(stripe),
        }
    }
}
