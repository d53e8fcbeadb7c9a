// src/api/auth.rs

use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{post, web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{normalize_email, AuthError};
use crate::error::{ApiError, ApiResult};
use crate::models::{LoginRequest, LoginResponse, RegisterRequest};
use crate::superuser;
use crate::token::TokenKeys;
use crate::AppState;

const BEARER_REQUIRED: &str = "A Bearer type token is required.";
const TOKEN_EMPTY: &str = "Token is empty.";
const TOKEN_INVALID: &str = "invalid token";

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::EmailTaken => ApiError::BadRequest(error.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(error.to_string()),
            AuthError::UserNotFound => ApiError::Unauthorized(TOKEN_INVALID.to_string()),
            AuthError::CustomerIdForbidden => ApiError::BadRequest(error.to_string()),
            AuthError::CustomerIdTaken => ApiError::BadRequest(error.to_string()),
            AuthError::PasswordHashForbidden => ApiError::BadRequest(error.to_string()),
            other => ApiError::internal("auth", other),
        }
    }
}

/// Extracts the raw token from `Authorization: Bearer <jwt>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let rest = value
        .strip_prefix("Bearer")
        .filter(|rest| rest.is_empty() || rest.starts_with(' '))
        .ok_or_else(|| ApiError::Unauthorized(BEARER_REQUIRED.to_string()))?;

    let token = rest.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized(TOKEN_EMPTY.to_string()));
    }
    Ok(token)
}

pub fn authenticate(headers: &HeaderMap, tokens: &TokenKeys) -> Result<Uuid, ApiError> {
    let token = bearer_token(headers)?;
    tokens.verify(token).map(|claims| claims.user_id).map_err(|e| {
        log::debug!("token rejected: {e}");
        ApiError::Unauthorized(TOKEN_INVALID.to_string())
    })
}

/// `X-Super-Token` must be present and correct.
pub fn require_superuser(req: &HttpRequest, state: &AppState) -> ApiResult<()> {
    match superuser_header(req) {
        None => Err(ApiError::Forbidden("Missing token".to_string())),
        Some(value) if state.superuser.matches(value) => Ok(()),
        Some(_) => {
            log::warn!("rejected superuser token from {:?}", req.peer_addr());
            Err(ApiError::Forbidden("Invalid token".to_string()))
        }
    }
}

/// `Ok(false)` when the header is absent; a wrong value is still an error.
pub fn optional_superuser(req: &HttpRequest, state: &AppState) -> ApiResult<bool> {
    match superuser_header(req) {
        None => Ok(false),
        Some(_) => require_superuser(req, state).map(|_| true),
    }
}

fn superuser_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(superuser::HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn app_state(req: &HttpRequest) -> Result<&web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))
}

/// Id of the caller, put into request extensions by [`JwtMiddleware`].
/// Outside the middleware the bearer header is validated on the spot.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let cached = req.extensions().get::<AuthUser>().copied();
        if let Some(user) = cached {
            return ready(Ok(user));
        }

        let result = app_state(req)
            .and_then(|state| authenticate(req.headers(), &state.tokens))
            .map(AuthUser);
        ready(result)
    }
}

#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    params(("X-Super-Token" = String, Header, description = "Superuser token")),
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Validation failed or email already taken"),
        (status = 403, description = "Missing or invalid superuser token")
    )
)]
#[post("/register")]
pub async fn register(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    require_superuser(&req, &state)?;

    let mut payload = payload.into_inner().trimmed();
    payload.email = normalize_email(&payload.email);
    payload.validate()?;

    state.auth.register(payload).await?;
    Ok(HttpResponse::Created().json(json!({ "message": "success" })))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed session token", body = LoginResponse),
        (status = 401, description = "incorrect credentials")
    )
)]
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    payload.validate()?;

    let (token, user) = state.auth.login(payload).await?;
    log::info!("user logged in user_id={}", user.id);

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "success".to_string(),
        token,
        user,
    }))
}

/// Middleware that:
/// - reads `Authorization: Bearer <jwt>`
/// - validates the JWT
/// - puts [`AuthUser`] into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let result = match req.app_data::<web::Data<AppState>>() {
            Some(state) => authenticate(req.headers(), &state.tokens),
            None => Err(ApiError::Internal("application state missing".to_string())),
        };

        match result {
            Ok(user_id) => {
                req.extensions_mut().insert(AuthUser(user_id));
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                let resp = req.error_response(err).map_into_right_body();
                Box::pin(async move { Ok(resp) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn message(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn bearer_scheme_is_required() {
        assert_eq!(message(bearer_token(&HeaderMap::new()).unwrap_err()), BEARER_REQUIRED);
        assert_eq!(message(bearer_token(&headers("Basic abc")).unwrap_err()), BEARER_REQUIRED);
        assert_eq!(message(bearer_token(&headers("Bearerabc")).unwrap_err()), BEARER_REQUIRED);
    }

    #[test]
    fn empty_bearer_token() {
        assert_eq!(message(bearer_token(&headers("Bearer")).unwrap_err()), TOKEN_EMPTY);
        assert_eq!(message(bearer_token(&headers("Bearer   ")).unwrap_err()), TOKEN_EMPTY);
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }
}
