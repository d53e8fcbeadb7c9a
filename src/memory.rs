//! In-process store used by the tests and when no `DATABASE_URL` is set.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{AnnouncementStore, StoreError, StoreResult, SubscriptionStore, UserStore};
use crate::models::{
    Announcement, AnnouncementChanges, NewAnnouncement, NewSubscription, NewUser, Subscription,
    User, UserChanges,
};
use crate::plans::Plan;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    announcements: Vec<Announcement>,
    subscriptions: Vec<Subscription>,
    next_announcement_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // a panic while holding the lock leaves plain data behind, keep serving it
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            stripe_customer_id: None,
            plan: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut tables = self.lock();

        if let Some(Some(customer_id)) = changes.stripe_customer_id.as_ref() {
            let taken = tables
                .users
                .iter()
                .any(|u| u.id != id && u.stripe_customer_id.as_ref() == Some(customer_id));
            if taken {
                return Err(StoreError::Conflict("stripe_customer_id".into()));
            }
        }

        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;

        if let Some(name) = changes.name {
            stored.name = name;
        }
        if let Some(password_hash) = changes.password_hash {
            stored.password_hash = password_hash;
        }
        if let Some(customer_id) = changes.stripe_customer_id {
            stored.stripe_customer_id = customer_id;
        }
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn record_billing(
        &self,
        id: Uuid,
        customer_id: Option<&str>,
        plan: Plan,
    ) -> StoreResult<()> {
        let mut tables = self.lock();

        if let Some(customer_id) = customer_id {
            let taken = tables
                .users
                .iter()
                .any(|u| u.id != id && u.stripe_customer_id.as_deref() == Some(customer_id));
            if taken {
                return Err(StoreError::Conflict("stripe_customer_id".into()));
            }
        }

        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;

        if stored.stripe_customer_id.is_none() {
            stored.stripe_customer_id = customer_id.map(str::to_string);
        }
        stored.plan = Some(plan);
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl AnnouncementStore for MemoryStore {
    async fn get_by_id(&self, id: i64) -> StoreResult<Announcement> {
        self.lock()
            .announcements
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_all(&self) -> StoreResult<Vec<Announcement>> {
        let mut all = self.lock().announcements.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all)
    }

    async fn create(&self, announcement: NewAnnouncement) -> StoreResult<Announcement> {
        let mut tables = self.lock();
        tables.next_announcement_id += 1;

        let now = Utc::now();
        let announcement = Announcement {
            id: tables.next_announcement_id,
            author_id: announcement.author_id,
            title: announcement.title,
            content: announcement.content,
            created_at: now,
            updated_at: now,
        };
        tables.announcements.push(announcement.clone());
        Ok(announcement)
    }

    async fn update(&self, id: i64, changes: AnnouncementChanges) -> StoreResult<Announcement> {
        let mut tables = self.lock();
        let stored = tables
            .announcements
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;

        stored.title = changes.title;
        stored.content = changes.content;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.lock();
        let before = tables.announcements.len();
        tables.announcements.retain(|a| a.id != id);
        if tables.announcements.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_active(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.expires_at > now)
            .max_by_key(|s| s.expires_at)
            .cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<Subscription>> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .find(|s| s.external_id == external_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Subscription>> {
        let mut records: Vec<Subscription> = self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.expires_at.cmp(&a.expires_at));
        Ok(records)
    }

    async fn insert_if_absent(
        &self,
        subscription: NewSubscription,
    ) -> StoreResult<Option<Subscription>> {
        let mut tables = self.lock();
        if tables
            .subscriptions
            .iter()
            .any(|s| s.external_id == subscription.external_id)
        {
            return Ok(None);
        }

        let now = Utc::now();
        let record = Subscription {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            plan: subscription.plan,
            external_id: subscription.external_id,
            expires_at: subscription.expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.push(record.clone());
        Ok(Some(record))
    }
}
