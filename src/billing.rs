// src/billing.rs
//
// Subscription lifecycle: Stripe checkout creation, webhook reconciliation and
// the "does this user hold a paid period" check. Each paid period is one
// subscription record keyed by the Stripe object that paid for it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{StoreError, SubscriptionStore, UserStore};
use crate::models::{NewSubscription, Subscription, User};
use crate::plans::{Plan, PlanCatalog};
use crate::stripe::webhook::{
    self, CheckoutSessionObject, Event, InvoiceObject, SignatureError, CHECKOUT_SESSION_COMPLETED,
    INVOICE_PAID,
};
use crate::stripe::{CheckoutSessionRequest, Payer, StripeClient, StripeError};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("unknown plan tag: {0}")]
    InvalidPlan(String),

    #[error("no price configured for plan {0}")]
    PlanNotConfigured(Plan),

    #[error("user already holds an active subscription")]
    AlreadySubscribed,

    #[error("no active subscription")]
    NoSubscription,

    #[error("signature rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("malformed event object: {0}")]
    MalformedPayload(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("event is missing {0}")]
    MissingField(&'static str),

    #[error("invalid plan metadata: {0}")]
    InvalidPlanMetadata(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BillingError {
    /// Failures that a redelivery of the same event can never fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BillingError::UnknownUser(_)
                | BillingError::MissingField(_)
                | BillingError::InvalidPlanMetadata(_)
                | BillingError::InvalidPrice(_)
                | BillingError::Store(StoreError::Conflict(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Recorded,
    Duplicate,
    Ignored,
}

pub struct BillingService {
    users: Arc<dyn UserStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    stripe: StripeClient,
    plans: PlanCatalog,
    signing_secret: String,
    frontend_url: String,
}

impl BillingService {
    pub fn new(
        users: Arc<dyn UserStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        stripe: StripeClient,
        plans: PlanCatalog,
        signing_secret: impl Into<String>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            subscriptions,
            stripe,
            plans,
            signing_secret: signing_secret.into(),
            frontend_url: frontend_url.into(),
        }
    }

    /// Returns the hosted checkout URL.
    pub async fn create_checkout_session(
        &self,
        user: &User,
        plan_tag: &str,
    ) -> Result<String, BillingError> {
        let plan: Plan = plan_tag
            .parse()
            .map_err(|_| BillingError::InvalidPlan(plan_tag.to_string()))?;
        let price_id = self
            .plans
            .price_for(plan)
            .ok_or(BillingError::PlanNotConfigured(plan))?;

        if self
            .subscriptions
            .find_active(user.id, Utc::now())
            .await?
            .is_some()
        {
            return Err(BillingError::AlreadySubscribed);
        }

        let payer = match user.stripe_customer_id.as_deref() {
            Some(customer) => Payer::Customer(customer.to_string()),
            None => Payer::Email(user.email.clone()),
        };

        let req = CheckoutSessionRequest {
            price_id: price_id.to_string(),
            plan,
            client_reference_id: user.id.to_string(),
            payer,
            success_url: format!(
                "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.frontend_url
            ),
            cancel_url: self.frontend_url.clone(),
        };

        let session = self.stripe.create_checkout_session(&req).await?;
        log::info!(
            "checkout session created user_id={} plan={} session={}",
            user.id,
            plan,
            session.id
        );

        session
            .url
            .ok_or_else(|| StripeError::InvalidResponse(format!("session {} has no url", session.id)))
            .map_err(BillingError::from)
    }

    pub async fn check_valid_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Subscription, BillingError> {
        self.subscriptions
            .find_active(user_id, Utc::now())
            .await?
            .ok_or(BillingError::NoSubscription)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Subscription>, BillingError> {
        Ok(self.subscriptions.list_for_user(user_id).await?)
    }

    pub fn verify_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Event, BillingError> {
        if self.signing_secret.is_empty() {
            log::error!("STRIPE_SIGN_KEY is not configured, rejecting webhook");
            return Err(SignatureError::Mismatch.into());
        }
        let header = signature.ok_or(SignatureError::MalformedHeader)?;
        Ok(webhook::construct_event(
            payload,
            header,
            &self.signing_secret,
            now,
        )?)
    }

    pub async fn handle_event(&self, event: Event) -> Result<WebhookOutcome, BillingError> {
        match event.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
                    .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;
                self.handle_checkout_completed(session).await
            }
            INVOICE_PAID => {
                let invoice: InvoiceObject = serde_json::from_value(event.data.object)
                    .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;
                self.handle_invoice_paid(invoice).await
            }
            other => {
                log::debug!("ignoring stripe event id={} type={other}", event.id);
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    pub async fn handle_checkout_completed(
        &self,
        session: CheckoutSessionObject,
    ) -> Result<WebhookOutcome, BillingError> {
        let reference = session
            .client_reference_id
            .as_deref()
            .ok_or(BillingError::MissingField("client_reference_id"))?;
        let user_id: Uuid = reference
            .parse()
            .map_err(|_| BillingError::UnknownUser(reference.to_string()))?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| BillingError::UnknownUser(reference.to_string()))?;

        let plan_tag = session
            .metadata
            .get("plan")
            .ok_or(BillingError::MissingField("metadata.plan"))?;
        let plan: Plan = plan_tag
            .parse()
            .map_err(|_| BillingError::InvalidPlanMetadata(plan_tag.clone()))?;

        if self
            .subscriptions
            .find_by_external_id(&session.id)
            .await?
            .is_some()
        {
            log::info!("checkout session already recorded session={}", session.id);
            return Ok(WebhookOutcome::Duplicate);
        }

        let subscription_id = session
            .subscription
            .as_ref()
            .ok_or(BillingError::MissingField("subscription"))?;
        let stripe_subscription = self.stripe.retrieve_subscription(subscription_id.id()).await?;
        let expires_at = stripe_subscription
            .period_end()
            .ok_or(BillingError::MissingField("current_period_end"))?;

        let customer = session.customer.as_ref().map(|c| c.id());
        self.users.record_billing(user.id, customer, plan).await?;

        self.insert_record(NewSubscription {
            user_id: user.id,
            plan,
            external_id: session.id,
            expires_at,
        })
        .await
    }

    pub async fn handle_invoice_paid(
        &self,
        invoice: InvoiceObject,
    ) -> Result<WebhookOutcome, BillingError> {
        let line = invoice
            .first_line()
            .ok_or(BillingError::MissingField("lines"))?;
        let customer = invoice
            .customer
            .as_ref()
            .map(|c| c.id())
            .ok_or(BillingError::MissingField("customer"))?;

        let price_id = line.price_id().ok_or(BillingError::MissingField("price"))?;
        let plan = self
            .plans
            .plan_for_price(price_id)
            .ok_or_else(|| BillingError::InvalidPrice(price_id.to_string()))?;
        let expires_at = line
            .period_end()
            .ok_or(BillingError::MissingField("period.end"))?;

        let user = self
            .users
            .find_by_customer_id(customer)
            .await?
            .ok_or_else(|| BillingError::UnknownUser(customer.to_string()))?;

        let outcome = self
            .insert_record(NewSubscription {
                user_id: user.id,
                plan,
                external_id: invoice.id.clone(),
                expires_at,
            })
            .await?;

        if outcome == WebhookOutcome::Recorded {
            self.users.record_billing(user.id, None, plan).await?;
        }
        Ok(outcome)
    }

    async fn insert_record(
        &self,
        record: NewSubscription,
    ) -> Result<WebhookOutcome, BillingError> {
        let external_id = record.external_id.clone();
        match self.subscriptions.insert_if_absent(record).await? {
            Some(stored) => {
                log::info!(
                    "subscription recorded user_id={} plan={} external_id={} expires_at={}",
                    stored.user_id,
                    stored.plan,
                    stored.external_id,
                    stored.expires_at
                );
                Ok(WebhookOutcome::Recorded)
            }
            None => {
                log::info!("subscription already recorded external_id={external_id}");
                Ok(WebhookOutcome::Duplicate)
            }
        }
    }
}
