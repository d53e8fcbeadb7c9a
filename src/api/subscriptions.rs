// src/api/subscriptions.rs

use actix_web::{get, web, HttpResponse};

use crate::api::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::Subscription;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/subscription",
    tag = "subscriptions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Furthest-expiring active record", body = Subscription),
        (status = 404, description = "No subscription")
    )
)]
#[get("/subscription")]
pub async fn current_subscription(
    state: web::Data<AppState>,
    user: AuthUser,
) -> ApiResult<HttpResponse> {
    let subscription = state.billing.check_valid_subscription(user.0).await?;
    Ok(HttpResponse::Ok().json(subscription))
}

#[utoipa::path(
    get,
    path = "/api/subscriptions",
    tag = "subscriptions",
    security(("bearer" = [])),
    responses((status = 200, description = "Newest expiry first", body = [Subscription]))
)]
#[get("/subscriptions")]
pub async fn list_subscriptions(
    state: web::Data<AppState>,
    user: AuthUser,
) -> ApiResult<HttpResponse> {
    let subscriptions = state.billing.list(user.0).await?;
    Ok(HttpResponse::Ok().json(subscriptions))
}
