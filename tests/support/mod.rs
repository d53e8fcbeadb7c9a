#![allow(dead_code)]

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, OnceLock};

use actix_web::web;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

use pdnode_site::config::Config;
use pdnode_site::memory::MemoryStore;
use pdnode_site::models::{RegisterRequest, User};
use pdnode_site::stripe::webhook::sign_payload;
use pdnode_site::superuser::SuperuserToken;
use pdnode_site::{AppState, Stores};

pub const SUPER_TOKEN: &str = "test-superuser-token";
pub const SIGN_KEY: &str = "whsec_test_secret";
pub const STRIPE_KEY: &str = "sk_test_123";
pub const FRONTEND_URL: &str = "http://frontend.test";
pub const PRICE_STARTER: &str = "price_starter";
pub const PRICE_PRO: &str = "price_pro";

/// Starter and pro are priced, plus is left unconfigured.
pub fn test_config(stripe_api_base: &str) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("BCRYPT_COST", "4".to_string()),
        ("FRONTEND_URL", FRONTEND_URL.to_string()),
        ("STRIPE_KEY", STRIPE_KEY.to_string()),
        ("STRIPE_SIGN_KEY", SIGN_KEY.to_string()),
        ("STRIPE_API_BASE", stripe_api_base.to_string()),
        ("STRIPE_PLAN_STARTER", PRICE_STARTER.to_string()),
        ("STRIPE_PLAN_PRO", PRICE_PRO.to_string()),
        ("JWT_SECRET", "test-jwt-secret".to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub struct TestState {
    pub store: Arc<MemoryStore>,
    pub state: web::Data<AppState>,
}

pub fn memory_state(stripe_api_base: &str) -> TestState {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        &test_config(stripe_api_base),
        Stores::from_shared(store.clone()),
        SuperuserToken::new(SUPER_TOKEN),
    )
    .expect("app state");

    TestState {
        store,
        state: web::Data::new(state),
    }
}

pub async fn seed_user(state: &AppState, name: &str, email: &str, password: &str) -> User {
    state
        .auth
        .register(RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .expect("seed user")
}

pub fn bearer(state: &AppState, user: &User) -> (&'static str, String) {
    let token = state.tokens.issue(user.id).expect("issue token");
    ("Authorization", format!("Bearer {token}"))
}

/// Serialized event plus a fresh `Stripe-Signature` value for it.
pub fn signed_event(event: &Value) -> (Vec<u8>, String) {
    let payload = serde_json::to_vec(event).expect("serialize event");
    let header = sign_payload(&payload, SIGN_KEY, Utc::now().timestamp());
    (payload, header)
}

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the database named in `TEST_DATABASE_URL` and runs migrations.
pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    sqlx::query(&drop_sql)
        .execute(&admin_pool)
        .await
        .expect("drop test db");
    sqlx::query(&create_sql)
        .execute(&admin_pool)
        .await
        .expect("create test db");
    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, _guard: guard }
}
