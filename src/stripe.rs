//! Stripe promotion code API
//!
//! Code minting is delegated entirely to Stripe. The [`PromotionCodes`] trait
//! is the seam the generator talks to; [`StripeClient`] is the real HTTP
//! implementation.

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::model::GenerationRequest;

/// Length of the random part appended to a code prefix
pub const RANDOM_SUFFIX_LEN: usize = 8;

/// Parameters for one `POST /v1/promotion_codes` call
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionCodeParams {
    pub coupon: String,
    /// Explicit code; Stripe generates one when absent
    pub code: Option<String>,
    pub max_redemptions: u32,
    pub restrictions: Option<Restrictions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Restrictions {
    pub minimum_amount: i64,
    pub minimum_amount_currency: String,
}

impl PromotionCodeParams {
    /// Flattens the params into Stripe's form-encoded field names
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("coupon", self.coupon.clone()),
            ("max_redemptions", self.max_redemptions.to_string()),
        ];
        if let Some(code) = &self.code {
            form.push(("code", code.clone()));
        }
        if let Some(restrictions) = &self.restrictions {
            form.push((
                "restrictions[minimum_amount]",
                restrictions.minimum_amount.to_string(),
            ));
            form.push((
                "restrictions[minimum_amount_currency]",
                restrictions.minimum_amount_currency.clone(),
            ));
        }
        form
    }
}

/// The subset of Stripe's promotion code object we use
#[derive(Deserialize, Debug, Clone)]
pub struct PromotionCode {
    pub id: String,
    pub code: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[async_trait]
pub trait PromotionCodes: Send + Sync + 'static {
    async fn create(&self, params: &PromotionCodeParams) -> Result<PromotionCode, AppError>;
}

/// Builds the API params for one code of a generation request.
///
/// Each call draws a fresh random suffix, so it must be called once per code.
pub fn build_params(request: &GenerationRequest) -> Result<PromotionCodeParams, AppError> {
    let code = request
        .prefix
        .as_deref()
        .map(|prefix| format!("{}{}", prefix, random_suffix(RANDOM_SUFFIX_LEN)));

    let restrictions = match (&request.minimum_amount, &request.minimum_amount_currency) {
        (Some(amount), Some(currency)) => {
            let minimum_amount = amount.parse::<i64>().map_err(|_| {
                AppError::Validation(format!("minimum amount {amount:?} is not a whole number"))
            })?;
            Some(Restrictions {
                minimum_amount,
                minimum_amount_currency: currency.clone(),
            })
        }
        _ => None,
    };

    Ok(PromotionCodeParams {
        coupon: request.coupon.clone(),
        code,
        max_redemptions: 1,
        restrictions,
    })
}

fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Stripe REST client authenticated with a secret key
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PromotionCodes for StripeClient {
    async fn create(&self, params: &PromotionCodeParams) -> Result<PromotionCode, AppError> {
        let url = format!("{}/v1/promotion_codes", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&params.to_form())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            // Stripe's own message is forwarded to the operator unchanged
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Stripe returned {}: {}", status, body));
            return Err(AppError::Stripe(message));
        }

        let code: PromotionCode = resp.json().await?;
        debug!(id = %code.id, code = %code.code, "promotion code created");
        Ok(code)
    }
}
