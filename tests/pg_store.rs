//! Runs against a real Postgres. Set `TEST_DATABASE_URL` and use
//! `cargo test -- --ignored`.

use chrono::{Duration, Utc};

use pdnode_site::db::{AnnouncementStore, PgStore, StoreError, SubscriptionStore, UserStore};
use pdnode_site::models::{
    AnnouncementChanges, NewAnnouncement, NewSubscription, NewUser, UserChanges,
};
use pdnode_site::plans::Plan;

mod support;

use support::init_test_db;

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: "Alice".to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$not-a-real-hash".to_string(),
    }
}

#[actix_web::test]
#[ignore]
async fn unique_email_is_enforced() {
    let db = init_test_db().await;
    let store = PgStore::new(db.pool.clone());

    let user = store.insert(new_user("alice@test.com")).await.unwrap();
    assert_eq!(
        store.find_by_email("alice@test.com").await.unwrap().map(|u| u.id),
        Some(user.id)
    );

    let err = store.insert(new_user("alice@test.com")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref field) if field == "email"));
}

#[actix_web::test]
#[ignore]
async fn record_billing_keeps_first_customer_id() {
    let db = init_test_db().await;
    let store = PgStore::new(db.pool.clone());
    let user = store.insert(new_user("alice@test.com")).await.unwrap();
    let other = store.insert(new_user("bob@test.com")).await.unwrap();

    store.record_billing(user.id, Some("cus_1"), Plan::Starter).await.unwrap();
    store.record_billing(user.id, Some("cus_2"), Plan::Pro).await.unwrap();

    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(stored.plan, Some(Plan::Pro));
    assert_eq!(
        store.find_by_customer_id("cus_1").await.unwrap().map(|u| u.id),
        Some(user.id)
    );

    let err = store
        .record_billing(other.id, Some("cus_1"), Plan::Plus)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref field) if field == "stripe_customer_id"));
}

#[actix_web::test]
#[ignore]
async fn profile_update_writes_only_named_columns() {
    let db = init_test_db().await;
    let store = PgStore::new(db.pool.clone());
    let user = store.insert(new_user("alice@test.com")).await.unwrap();
    store.record_billing(user.id, Some("cus_1"), Plan::Pro).await.unwrap();

    let updated = store
        .update_profile(
            user.id,
            UserChanges {
                name: Some("Bob".to_string()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Bob");
    assert_eq!(updated.password_hash, user.password_hash);
    assert_eq!(updated.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(updated.plan, Some(Plan::Pro));

    let cleared = store
        .update_profile(
            user.id,
            UserChanges {
                stripe_customer_id: Some(None),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.stripe_customer_id.is_none());
    assert_eq!(cleared.name, "Bob");

    let missing = store
        .update_profile(uuid::Uuid::new_v4(), UserChanges::default())
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::NotFound));
}

#[actix_web::test]
#[ignore]
async fn subscription_insert_is_idempotent() {
    let db = init_test_db().await;
    let store = PgStore::new(db.pool.clone());
    let user = store.insert(new_user("alice@test.com")).await.unwrap();

    let record = NewSubscription {
        user_id: user.id,
        plan: Plan::Pro,
        external_id: "cs_1".to_string(),
        expires_at: Utc::now() + Duration::days(30),
    };
    assert!(store.insert_if_absent(record.clone()).await.unwrap().is_some());
    assert!(store.insert_if_absent(record).await.unwrap().is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[actix_web::test]
#[ignore]
async fn find_active_prefers_latest_expiry() {
    let db = init_test_db().await;
    let store = PgStore::new(db.pool.clone());
    let user = store.insert(new_user("alice@test.com")).await.unwrap();
    let now = Utc::now();

    for (external_id, days) in [("cs_expired", -2), ("in_short", 5), ("in_long", 40)] {
        store
            .insert_if_absent(NewSubscription {
                user_id: user.id,
                plan: Plan::Starter,
                external_id: external_id.to_string(),
                expires_at: now + Duration::days(days),
            })
            .await
            .unwrap();
    }

    let active = store.find_active(user.id, now).await.unwrap().unwrap();
    assert_eq!(active.external_id, "in_long");

    let all = store.list_for_user(user.id).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|s| s.external_id.as_str()).collect();
    assert_eq!(ids, ["in_long", "in_short", "cs_expired"]);

    assert!(store
        .find_active(user.id, now + Duration::days(41))
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
#[ignore]
async fn announcements_crud() {
    let db = init_test_db().await;
    let store = PgStore::new(db.pool.clone());
    let author = store.insert(new_user("alice@test.com")).await.unwrap();

    let first = store
        .create(NewAnnouncement {
            author_id: author.id,
            title: "first".to_string(),
            content: "a".to_string(),
        })
        .await
        .unwrap();
    let second = store
        .create(NewAnnouncement {
            author_id: author.id,
            title: "second".to_string(),
            content: "b".to_string(),
        })
        .await
        .unwrap();

    let titles: Vec<String> = store
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect();
    assert_eq!(titles, ["second", "first"]);

    let changes = AnnouncementChanges {
        title: "edited".to_string(),
        content: "c".to_string(),
    };
    let updated = AnnouncementStore::update(&store, first.id, changes)
        .await
        .unwrap();
    assert_eq!(updated.title, "edited");
    assert_eq!(updated.author_id, author.id);

    store.delete(second.id).await.unwrap();
    assert!(matches!(store.get_by_id(second.id).await, Err(StoreError::NotFound)));
    assert!(matches!(store.delete(second.id).await, Err(StoreError::NotFound)));
}
