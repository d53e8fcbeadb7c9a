// src/announcements.rs

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::db::{AnnouncementStore, StoreError};
use crate::models::{Announcement, AnnouncementChanges, AnnouncementRequest, NewAnnouncement};

/// Who is asking for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Uuid),
    Superuser,
}

impl Actor {
    fn may_modify(&self, announcement: &Announcement) -> bool {
        match self {
            Actor::Superuser => true,
            Actor::User(id) => *id == announcement.author_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnnouncementError {
    #[error("announcement not found")]
    NotFound,

    #[error("not the author")]
    Forbidden,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AnnouncementError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => AnnouncementError::NotFound,
            other => AnnouncementError::Store(other),
        }
    }
}

pub struct AnnouncementService {
    store: Arc<dyn AnnouncementStore>,
}

impl AnnouncementService {
    pub fn new(store: Arc<dyn AnnouncementStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: i64) -> Result<Announcement, AnnouncementError> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Announcement>, AnnouncementError> {
        Ok(self.store.get_all().await?)
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        req: AnnouncementRequest,
    ) -> Result<Announcement, AnnouncementError> {
        let announcement = self
            .store
            .create(NewAnnouncement {
                author_id,
                title: req.title,
                content: req.content,
            })
            .await?;

        log::info!(
            "announcement created id={} author_id={author_id}",
            announcement.id
        );
        Ok(announcement)
    }

    pub async fn update(
        &self,
        actor: Actor,
        id: i64,
        req: AnnouncementRequest,
    ) -> Result<Announcement, AnnouncementError> {
        self.authorize(actor, id).await?;

        let announcement = self
            .store
            .update(
                id,
                AnnouncementChanges {
                    title: req.title,
                    content: req.content,
                },
            )
            .await?;

        log::info!("announcement updated id={id} actor={actor:?}");
        Ok(announcement)
    }

    pub async fn delete(&self, actor: Actor, id: i64) -> Result<(), AnnouncementError> {
        self.authorize(actor, id).await?;
        self.store.delete(id).await?;

        log::info!("announcement deleted id={id} actor={actor:?}");
        Ok(())
    }

    async fn authorize(&self, actor: Actor, id: i64) -> Result<(), AnnouncementError> {
        let existing = self.store.get_by_id(id).await?;
        if !actor.may_modify(&existing) {
            log::warn!("announcement change rejected id={id} actor={actor:?}");
            return Err(AnnouncementError::Forbidden);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn request(title: &str) -> AnnouncementRequest {
        AnnouncementRequest {
            title: title.into(),
            content: "body".into(),
        }
    }

    #[actix_web::test]
    async fn non_author_cannot_modify() {
        let service = AnnouncementService::new(Arc::new(MemoryStore::new()));
        let author = Uuid::new_v4();
        let created = service.create(author, request("hello")).await.unwrap();

        let stranger = Actor::User(Uuid::new_v4());
        let err = service
            .update(
                stranger,
                created.id,
                AnnouncementRequest {
                    title: "hijacked".into(),
                    content: "x".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AnnouncementError::Forbidden));

        let err = service.delete(stranger, created.id).await.unwrap_err();
        assert!(matches!(err, AnnouncementError::Forbidden));

        let stored = service.get(created.id).await.unwrap();
        assert_eq!(stored.title, "hello");
    }

    #[actix_web::test]
    async fn superuser_may_modify_anything() {
        let service = AnnouncementService::new(Arc::new(MemoryStore::new()));
        let created = service
            .create(Uuid::new_v4(), request("hello"))
            .await
            .unwrap();

        service.delete(Actor::Superuser, created.id).await.unwrap();
        assert!(matches!(
            service.get(created.id).await.unwrap_err(),
            AnnouncementError::NotFound
        ));
    }

    #[actix_web::test]
    async fn missing_id_is_not_found() {
        let service = AnnouncementService::new(Arc::new(MemoryStore::new()));
        let err = service.delete(Actor::Superuser, 42).await.unwrap_err();
        assert!(matches!(err, AnnouncementError::NotFound));
    }
}
