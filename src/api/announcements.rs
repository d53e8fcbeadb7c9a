// src/api/announcements.rs

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::announcements::{Actor, AnnouncementError};
use crate::api::auth::{optional_superuser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::models::{Announcement, AnnouncementRequest};
use crate::AppState;

const NOT_FOUND: &str = "Announcement not found";
const NOT_FOUND_FOR_CHANGE: &str = "The announcement could not be found.";
const NOT_AUTHOR: &str = "You do not have permission to modify other people's announcements.";

fn read_error(error: AnnouncementError) -> ApiError {
    match error {
        AnnouncementError::NotFound => ApiError::NotFound(NOT_FOUND.to_string()),
        other => ApiError::internal("announcements", other),
    }
}

fn change_error(error: AnnouncementError) -> ApiError {
    match error {
        AnnouncementError::NotFound => ApiError::NotFound(NOT_FOUND_FOR_CHANGE.to_string()),
        AnnouncementError::Forbidden => ApiError::Forbidden(NOT_AUTHOR.to_string()),
        other => ApiError::internal("announcements", other),
    }
}

/// A valid `X-Super-Token` next to the bearer token lifts the author check.
fn actor(req: &HttpRequest, state: &AppState, user: AuthUser) -> ApiResult<Actor> {
    if optional_superuser(req, state)? {
        Ok(Actor::Superuser)
    } else {
        Ok(Actor::User(user.0))
    }
}

#[utoipa::path(
    get,
    path = "/announcements",
    tag = "announcements",
    responses((status = 200, description = "Newest first", body = [Announcement]))
)]
#[get("/announcements")]
pub async fn list_announcements(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let announcements = state.announcements.list().await.map_err(read_error)?;
    Ok(HttpResponse::Ok().json(announcements))
}

#[utoipa::path(
    get,
    path = "/announcements/{id}",
    tag = "announcements",
    params(("id" = i64, Path, description = "Announcement id")),
    responses(
        (status = 200, body = Announcement),
        (status = 404, description = "Announcement not found")
    )
)]
#[get("/announcements/{id}")]
pub async fn get_announcement(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let announcement = state
        .announcements
        .get(id.into_inner())
        .await
        .map_err(read_error)?;
    Ok(HttpResponse::Ok().json(announcement))
}

#[utoipa::path(
    post,
    path = "/announcements",
    tag = "announcements",
    request_body = AnnouncementRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Created"),
        (status = 400, description = "Missing title or content"),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
#[post("/announcements")]
pub async fn create_announcement(
    state: web::Data<AppState>,
    user: AuthUser,
    payload: web::Json<AnnouncementRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    payload.validate()?;

    let announcement = state
        .announcements
        .create(user.0, payload)
        .await
        .map_err(read_error)?;

    Ok(HttpResponse::Created().json(json!({ "message": "Created", "data": announcement })))
}

#[utoipa::path(
    put,
    path = "/announcements/{id}",
    tag = "announcements",
    request_body = AnnouncementRequest,
    params(("id" = i64, Path, description = "Announcement id")),
    security(("bearer" = [])),
    responses(
        (status = 200, body = Announcement),
        (status = 403, description = "Not the author"),
        (status = 404, description = "The announcement could not be found.")
    )
)]
#[put("/announcements/{id}")]
pub async fn update_announcement(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
    payload: web::Json<AnnouncementRequest>,
) -> ApiResult<HttpResponse> {
    let actor = actor(&req, &state, user)?;
    let payload = payload.into_inner();
    payload.validate()?;

    let announcement = state
        .announcements
        .update(actor, id.into_inner(), payload)
        .await
        .map_err(change_error)?;

    Ok(HttpResponse::Ok().json(announcement))
}

#[utoipa::path(
    delete,
    path = "/announcements/{id}",
    tag = "announcements",
    params(("id" = i64, Path, description = "Announcement id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "The announcement could not be found.")
    )
)]
#[delete("/announcements/{id}")]
pub async fn delete_announcement(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: AuthUser,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let actor = actor(&req, &state, user)?;

    state
        .announcements
        .delete(actor, id.into_inner())
        .await
        .map_err(change_error)?;

    Ok(HttpResponse::Ok().json(json!({ "message": "deleted" })))
}
