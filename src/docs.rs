use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::ping,
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::announcements::list_announcements,
        crate::api::announcements::get_announcement,
        crate::api::announcements::create_announcement,
        crate::api::announcements::update_announcement,
        crate::api::announcements::delete_announcement,
        crate::api::users::me,
        crate::api::users::update_me,
        crate::api::users::update_user,
        crate::api::payments::create_checkout,
        crate::api::subscriptions::current_subscription,
        crate::api::subscriptions::list_subscriptions,
        crate::api::webhooks::stripe_webhook
    ),
    components(
        schemas(
            crate::plans::Plan,
            crate::models::User,
            crate::models::Announcement,
            crate::models::Subscription,
            crate::models::RegisterRequest,
            crate::models::LoginRequest,
            crate::models::LoginResponse,
            crate::models::UpdateUserRequest,
            crate::models::AnnouncementRequest,
            crate::models::CheckoutRequest,
            crate::models::CheckoutResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration and login"),
        (name = "announcements", description = "Announcements"),
        (name = "users", description = "User profiles"),
        (name = "subscriptions", description = "Stripe checkout and subscription state"),
        (name = "webhooks", description = "Callbacks from Stripe")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
