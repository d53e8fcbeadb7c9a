// src/stripe/mod.rs
//
// Minimal client for the Stripe REST API (form-encoded requests, bearer auth).

pub mod webhook;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::plans::Plan;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Who pays: an existing Stripe customer or a fresh one created from an email.
#[derive(Debug, Clone)]
pub enum Payer {
    Customer(String),
    Email(String),
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub price_id: String,
    pub plan: Plan,
    pub client_reference_id: String,
    pub payer: Payer,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "client_reference_id".to_string(),
                self.client_reference_id.clone(),
            ),
            ("metadata[plan]".to_string(), self.plan.to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        match &self.payer {
            Payer::Customer(id) => form.push(("customer".to_string(), id.clone())),
            Payer::Email(email) => form.push(("customer_email".to_string(), email.clone())),
        }

        form
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

impl StripeSubscription {
    /// Newer API versions only carry the period on items; older ones on the
    /// subscription itself.
    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .and_then(|item| item.current_period_end)
            .or(self.current_period_end)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

impl StripeClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_checkout_session(
        &self,
        req: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .form(&req.form())
            .send()
            .await?;

        read_json(resp).await
    }

    pub async fn retrieve_subscription(&self, id: &str) -> Result<StripeSubscription, StripeError> {
        let resp = self
            .http
            .get(format!("{}/v1/subscriptions/{id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        read_json(resp).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, StripeError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(StripeError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<T>(&body)
        .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkout_form_prefers_existing_customer() {
        let req = CheckoutSessionRequest {
            price_id: "price_pro".into(),
            plan: Plan::Pro,
            client_reference_id: "user-1".into(),
            payer: Payer::Customer("cus_1".into()),
            success_url: "http://x/ok".into(),
            cancel_url: "http://x".into(),
        };
        let form = req.form();

        assert!(form.contains(&("customer".into(), "cus_1".into())));
        assert!(form.contains(&("metadata[plan]".into(), "pro".into())));
        assert!(form.contains(&("line_items[0][price]".into(), "price_pro".into())));
        assert!(!form.iter().any(|(k, _)| k == "customer_email"));
    }

    #[test]
    fn period_end_prefers_item_level() {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "current_period_end": 1_000,
            "items": { "data": [ { "current_period_end": 2_000 } ] }
        }))
        .unwrap();
        assert_eq!(sub.period_end().map(|d| d.timestamp()), Some(2_000));

        let legacy: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_2",
            "current_period_end": 1_000
        }))
        .unwrap();
        assert_eq!(legacy.period_end().map(|d| d.timestamp()), Some(1_000));
    }
}
