// src/api/users.rs

use actix_web::{get, patch, web, HttpRequest, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::{require_superuser, AuthUser};
use crate::auth::AuthError;
use crate::error::{ApiError, ApiResult};
use crate::models::{UpdateUserRequest, User};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, body = User), (status = 401, description = "invalid token"))
)]
#[get("/users/me")]
pub async fn me(state: web::Data<AppState>, user: AuthUser) -> ApiResult<HttpResponse> {
    let user = state.auth.current_user(user.0).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, body = User),
        (status = 400, description = "Validation failed or stripe_customer_id in body")
    )
)]
#[patch("/users/me")]
pub async fn update_me(
    state: web::Data<AppState>,
    user: AuthUser,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    let user = state.auth.update_user(user.0, payload, false).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    request_body = UpdateUserRequest,
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("X-Super-Token" = String, Header, description = "Superuser token")
    ),
    responses(
        (status = 200, body = User),
        (status = 403, description = "Missing or invalid superuser token"),
        (status = 404, description = "User not found")
    )
)]
#[patch("/users/{id}")]
pub async fn update_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<HttpResponse> {
    require_superuser(&req, &state)?;

    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    let user = state
        .auth
        .update_user(id.into_inner(), payload, true)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;
    Ok(HttpResponse::Ok().json(user))
}
