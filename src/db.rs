// src/db.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Announcement, AnnouncementChanges, NewAnnouncement, NewSubscription, NewUser, Subscription,
    User, UserChanges,
};
use crate::plans::Plan;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Unique constraint hit; carries the offending field.
    #[error("{0} already exists")]
    Conflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    fn classify(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                let field = match db.constraint() {
                    Some(c) if c.contains("email") => "email",
                    Some(c) if c.contains("stripe_customer_id") => "stripe_customer_id",
                    Some(c) if c.contains("external_id") => "external_id",
                    _ => "record",
                };
                StoreError::Conflict(field.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>>;
    async fn insert(&self, user: NewUser) -> StoreResult<User>;
    /// Writes only the columns present in `changes`, in one statement.
    async fn update_profile(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;
    /// Sets the plan and fills the customer id only when none is stored yet.
    async fn record_billing(&self, id: Uuid, customer_id: Option<&str>, plan: Plan)
        -> StoreResult<()>;
}

/// The announcement capability: everything the HTTP layer needs, nothing more.
#[async_trait]
pub trait AnnouncementStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> StoreResult<Announcement>;
    /// Newest first.
    async fn get_all(&self) -> StoreResult<Vec<Announcement>>;
    async fn create(&self, announcement: NewAnnouncement) -> StoreResult<Announcement>;
    async fn update(&self, id: i64, changes: AnnouncementChanges) -> StoreResult<Announcement>;
    async fn delete(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The furthest-expiring record with `expires_at > now`.
    async fn find_active(&self, user_id: Uuid, now: DateTime<Utc>)
        -> StoreResult<Option<Subscription>>;
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Subscription>>;
    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>>;
    /// Returns `None` when a record with the same external id already exists.
    async fn insert_if_absent(&self, subscription: NewSubscription)
        -> StoreResult<Option<Subscription>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, stripe_customer_id, plan, created_at, updated_at";
const ANNOUNCEMENT_COLUMNS: &str = "id, author_id, title, content, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan, external_id, expires_at, created_at, updated_at";

fn parse_plan(raw: &str) -> StoreResult<Plan> {
    raw.parse()
        .map_err(|e: crate::plans::UnknownPlan| StoreError::Corrupt(e.to_string()))
}

fn user_from_row(r: &PgRow) -> StoreResult<User> {
    let plan: Option<String> = r.try_get("plan")?;
    Ok(User {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        email: r.try_get("email")?,
        password_hash: r.try_get("password_hash")?,
        stripe_customer_id: r.try_get("stripe_customer_id")?,
        plan: plan.as_deref().map(parse_plan).transpose()?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn announcement_from_row(r: &PgRow) -> StoreResult<Announcement> {
    Ok(Announcement {
        id: r.try_get("id")?,
        author_id: r.try_get("author_id")?,
        title: r.try_get("title")?,
        content: r.try_get("content")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn subscription_from_row(r: &PgRow) -> StoreResult<Subscription> {
    let plan: String = r.try_get("plan")?;
    Ok(Subscription {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        plan: parse_plan(&plan)?,
        external_id: r.try_get("external_id")?,
        expires_at: r.try_get("expires_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::classify)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::classify)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO users (id, name, email, password_hash)
               VALUES ($1, $2, $3, $4)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        user_from_row(&row)
    }

    async fn update_profile(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let (set_customer, customer_id) = match changes.stripe_customer_id {
            Some(customer_id) => (true, customer_id),
            None => (false, None),
        };

        let row = sqlx::query(&format!(
            r#"UPDATE users
               SET name = COALESCE($2, name),
                   password_hash = COALESCE($3, password_hash),
                   stripe_customer_id = CASE WHEN $4 THEN $5 ELSE stripe_customer_id END,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.password_hash)
        .bind(set_customer)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        user_from_row(&row)
    }

    async fn record_billing(
        &self,
        id: Uuid,
        customer_id: Option<&str>,
        plan: Plan,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE users
               SET stripe_customer_id = COALESCE(stripe_customer_id, $2),
                   plan = $3,
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(customer_id)
        .bind(plan.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AnnouncementStore for PgStore {
    async fn get_by_id(&self, id: i64) -> StoreResult<Announcement> {
        let row = sqlx::query(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        announcement_from_row(&row)
    }

    async fn get_all(&self) -> StoreResult<Vec<Announcement>> {
        let rows = sqlx::query(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        rows.iter().map(announcement_from_row).collect()
    }

    async fn create(&self, announcement: NewAnnouncement) -> StoreResult<Announcement> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO announcements (author_id, title, content)
               VALUES ($1, $2, $3)
               RETURNING {ANNOUNCEMENT_COLUMNS}"#
        ))
        .bind(announcement.author_id)
        .bind(&announcement.title)
        .bind(&announcement.content)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        announcement_from_row(&row)
    }

    async fn update(&self, id: i64, changes: AnnouncementChanges) -> StoreResult<Announcement> {
        let row = sqlx::query(&format!(
            r#"UPDATE announcements
               SET title = $2, content = $3, updated_at = NOW()
               WHERE id = $1
               RETURNING {ANNOUNCEMENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.content)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        announcement_from_row(&row)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn find_active(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"SELECT {SUBSCRIPTION_COLUMNS}
               FROM subscriptions
               WHERE user_id = $1 AND expires_at > $2
               ORDER BY expires_at DESC
               LIMIT 1"#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {SUBSCRIPTION_COLUMNS}
               FROM subscriptions
               WHERE user_id = $1
               ORDER BY expires_at DESC"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn insert_if_absent(
        &self,
        subscription: NewSubscription,
    ) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO subscriptions (id, user_id, plan, external_id, expires_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (external_id) DO NOTHING
               RETURNING {SUBSCRIPTION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(subscription.user_id)
        .bind(subscription.plan.as_str())
        .bind(&subscription.external_id)
        .bind(subscription.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        row.as_ref().map(subscription_from_row).transpose()
    }
}
