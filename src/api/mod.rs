// src/api/mod.rs

pub mod announcements;
pub mod auth;
pub mod payments;
pub mod subscriptions;
pub mod users;
pub mod webhooks;

use actix_web::{error, get, web, HttpResponse, Responder};
use serde_json::json;
use utoipa::OpenApi;

use crate::docs::ApiDoc;
use crate::error::ApiError;

/// Raw body limit for the webhook (the only `web::Bytes` extractor).
pub const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[utoipa::path(
    get,
    path = "/ping",
    tag = "health",
    responses((status = 200, description = "pong"))
)]
#[get("/ping")]
pub async fn ping() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "pong" }))
}

#[get("/api-docs/openapi.json")]
pub async fn openapi() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Registers every route. Shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let message = match &err {
            error::JsonPayloadError::ContentType => {
                "Content-Type must be application/json".to_string()
            }
            other => other.to_string(),
        };
        ApiError::Validation(message).into()
    }))
    .app_data(web::PayloadConfig::new(WEBHOOK_BODY_LIMIT))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        log::debug!("path rejected: {err}");
        ApiError::NotFound("Not found".to_string()).into()
    }))
    .service(index)
    .service(ping)
    .service(openapi)
    // public
    .service(auth::register)
    .service(auth::login)
    .service(announcements::list_announcements)
    .service(announcements::get_announcement)
    // bearer token checked by the AuthUser extractor
    .service(announcements::create_announcement)
    .service(announcements::update_announcement)
    .service(announcements::delete_announcement)
    // superuser
    .service(users::update_user)
    // must come before the /api scope, which would otherwise swallow it
    .service(webhooks::stripe_webhook)
    // protected
    .service(
        web::scope("/api")
            .wrap(auth::JwtMiddleware)
            .service(payments::create_checkout)
            .service(subscriptions::current_subscription)
            .service(subscriptions::list_subscriptions)
            .service(users::me)
            .service(users::update_me),
    );
}
