//! Stripe Checkout client.
//!
//! Implements the Checkout Sessions API for payment initiation and
//! webhook signature verification for asynchronous settlement.

use crate::config::StripeConfig;
use anyhow::{anyhow, Result};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::utils::signature::verify_hmac_sha256;
use uuid::Uuid;

/// Gateway event type for a completed checkout.
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Gateway event type for an expired/abandoned checkout.
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";

/// Maximum accepted age of a signed webhook timestamp, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe client for interacting with the Checkout Sessions API.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    config: StripeConfig,
}

/// Opaque metadata attached to a checkout session and echoed back in
/// webhook events. The booking does not exist yet at session-creation time,
/// so it is never carried here.
#[derive(Debug, Clone)]
pub struct CheckoutMetadata {
    pub payment_id: Uuid,
    pub slot_id: Uuid,
    pub actor_id: Uuid,
}

/// Response from checkout session creation.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    /// Gateway session id (unique across all payments).
    pub id: String,
    /// Hosted checkout page to redirect the payer to.
    pub url: String,
}

/// Stripe API error response.
#[derive(Debug, Deserialize)]
pub struct StripeApiError {
    pub error: StripeApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct StripeApiErrorDetail {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Deserialize)]
pub struct GatewayEventData {
    pub object: CheckoutSessionObject,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionMetadata {
    pub payment_id: Option<String>,
    pub slot_id: Option<String>,
    pub actor_id: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Check if the gateway is configured for opening checkout sessions.
    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
            && !self.config.success_url.is_empty()
            && !self.config.cancel_url.is_empty()
    }

    /// Check if webhook signature verification is possible.
    pub fn is_webhook_configured(&self) -> bool {
        !self.config.webhook_secret.expose_secret().is_empty()
    }

    pub fn success_url(&self) -> &str {
        &self.config.success_url
    }

    pub fn cancel_url(&self) -> &str {
        &self.config.cancel_url
    }

    /// Open a hosted checkout session.
    ///
    /// # Arguments
    /// * `amount` - Amount in the smallest currency unit, passed through untouched
    /// * `currency` - Currency code (e.g. "NPR")
    /// * `label` - Human-readable line-item label shown on the checkout page
    /// * `cancel_url` - Cancel redirect, already carrying the payment id
    /// * `metadata` - Echoed back verbatim in webhook events
    pub async fn create_checkout_session(
        &self,
        amount: i64,
        currency: &str,
        label: &str,
        cancel_url: &str,
        metadata: &CheckoutMetadata,
    ) -> Result<CheckoutSession> {
        if !self.is_configured() {
            return Err(anyhow!("Stripe credentials or redirect URLs not configured"));
        }

        let params: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "line_items[0][price_data][currency]",
                currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                label.to_string(),
            ),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", cancel_url.to_string()),
            ("metadata[payment_id]", metadata.payment_id.to_string()),
            ("metadata[slot_id]", metadata.slot_id.to_string()),
            ("metadata[actor_id]", metadata.actor_id.to_string()),
        ];

        let url = format!("{}/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Stripe create session response");

        if status.is_success() {
            let session: CheckoutSession = serde_json::from_str(&body)?;
            tracing::info!(
                session_id = %session.id,
                amount = amount,
                currency = %currency,
                "Checkout session created"
            );
            Ok(session)
        } else {
            let error: StripeApiError =
                serde_json::from_str(&body).unwrap_or_else(|_| StripeApiError {
                    error: StripeApiErrorDetail {
                        error_type: None,
                        code: None,
                        message: Some(body.clone()),
                    },
                });
            tracing::error!(
                error_type = ?error.error.error_type,
                code = ?error.error.code,
                message = ?error.error.message,
                "Checkout session creation failed"
            );
            Err(anyhow!(
                "Stripe error: {}",
                error.error.message.unwrap_or_else(|| status.to_string())
            ))
        }
    }

    /// Verify a webhook signature header.
    ///
    /// The header has the form `t=<unix>,v1=<hex>` where the signature is
    /// `HMAC-SHA256("{t}.{body}", webhook_secret)`. A missing or malformed
    /// header is an error; a wrong signature or a stale timestamp returns
    /// `Ok(false)`.
    pub fn verify_webhook_signature(&self, body: &[u8], signature_header: &str) -> Result<bool> {
        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("Signature header missing timestamp"))?;
        let signature = signature.ok_or_else(|| anyhow!("Signature header missing v1 signature"))?;

        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| anyhow!("Signature timestamp is not a number"))?;

        if (Utc::now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            tracing::warn!(timestamp = timestamp, "Webhook timestamp outside tolerance");
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(body));

        let is_valid = verify_hmac_sha256(
            self.config.webhook_secret.expose_secret(),
            signed_payload.as_bytes(),
            signature,
        )?;

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Parse a webhook event from the raw request body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<GatewayEvent> {
        let event: GatewayEvent = serde_json::from_str(body)?;
        Ok(event)
    }
}
