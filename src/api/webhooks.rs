// src/api/webhooks.rs

use actix_web::{post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::billing::{BillingError, WebhookOutcome};
use crate::error::{ApiError, ApiResult};
use crate::stripe::webhook::SIGNATURE_HEADER;
use crate::AppState;

/// Stripe sends the raw body; the signature covers exact bytes, so no JSON
/// extractor here.
#[utoipa::path(
    post,
    path = "/api/webhook/stripe",
    tag = "webhooks",
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event handled, ignored or already seen"),
        (status = 400, description = "Invalid signature or malformed event"),
        (status = 500, description = "Transient failure, Stripe should retry")
    )
)]
#[post("/api/webhook/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    let event = state
        .billing
        .verify_event(&body, signature, Utc::now())
        .map_err(|e| {
            log::warn!("stripe webhook rejected: {e}");
            ApiError::BadRequest("Invalid signature".to_string())
        })?;

    let event_id = event.id.clone();
    let event_type = event.event_type.clone();
    log::info!("stripe webhook event={event_id} type={event_type}");

    match state.billing.handle_event(event).await {
        Ok(WebhookOutcome::Recorded) => Ok(HttpResponse::Ok().json(json!({ "ok": true }))),
        Ok(WebhookOutcome::Duplicate) => {
            Ok(HttpResponse::Ok().json(json!({ "ok": true, "idempotent": true })))
        }
        Ok(WebhookOutcome::Ignored) => {
            Ok(HttpResponse::Ok().json(json!({ "ok": true, "ignored": true })))
        }
        // redelivery cannot fix these, acknowledge so Stripe stops retrying
        Err(e) if e.is_permanent() => {
            log::warn!("stripe webhook event={event_id} type={event_type} dropped: {e}");
            Ok(HttpResponse::Ok().json(json!({ "ok": true, "ignored": true })))
        }
        Err(e @ BillingError::MalformedPayload(_)) => {
            log::warn!("stripe webhook event={event_id} type={event_type} malformed: {e}");
            Err(e.into())
        }
        Err(e) => Err(ApiError::internal(
            &format!("stripe webhook event={event_id} type={event_type}"),
            e,
        )),
    }
}
