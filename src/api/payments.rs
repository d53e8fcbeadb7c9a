// src/api/payments.rs

use actix_web::{post, web, HttpResponse};

use crate::api::auth::AuthUser;
use crate::billing::BillingError;
use crate::error::{ApiError, ApiResult};
use crate::models::{CheckoutRequest, CheckoutResponse};
use crate::AppState;

impl From<BillingError> for ApiError {
    fn from(error: BillingError) -> Self {
        match error {
            BillingError::InvalidPlan(_) => {
                ApiError::BadRequest("Invalid plan selection".to_string())
            }
            BillingError::PlanNotConfigured(plan) => {
                log::error!("no Stripe price configured for plan={plan}");
                ApiError::BadRequest("Plan configuration missing or invalid".to_string())
            }
            BillingError::AlreadySubscribed => {
                ApiError::BadRequest("Do not subscribe repeatedly.".to_string())
            }
            BillingError::NoSubscription => ApiError::NotFound("No subscription".to_string()),
            BillingError::Signature(_) => ApiError::BadRequest("Invalid signature".to_string()),
            BillingError::MalformedPayload(detail) => {
                ApiError::BadRequest(format!("Malformed event: {detail}"))
            }
            BillingError::Stripe(e) => {
                log::error!("stripe request failed: {e}");
                ApiError::Upstream("Could not create session".to_string())
            }
            other => ApiError::internal("billing", other),
        }
    }
}

/// Creates a Stripe checkout session and hands back the hosted page URL.
#[utoipa::path(
    post,
    path = "/api/checkout/subscription",
    tag = "subscriptions",
    request_body = CheckoutRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, body = CheckoutResponse),
        (status = 400, description = "Invalid plan, plan not configured or already subscribed"),
        (status = 500, description = "Could not create session")
    )
)]
#[post("/checkout/subscription")]
pub async fn create_checkout(
    state: web::Data<AppState>,
    user: AuthUser,
    payload: web::Json<CheckoutRequest>,
) -> ApiResult<HttpResponse> {
    let user = state.auth.current_user(user.0).await?;

    let url = state
        .billing
        .create_checkout_session(&user, payload.plan.trim())
        .await?;

    Ok(HttpResponse::Ok().json(CheckoutResponse {
        url,
        status: "success".to_string(),
    }))
}
