// src/main.rs
use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use pdnode_site::config::Config;
use pdnode_site::db::PgStore;
use pdnode_site::memory::MemoryStore;
use pdnode_site::{api, superuser, AppState, Stores};

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    let config = Config::from_env().map_err(|e| startup_error("config", e))?;

    let default_level = if config.env.is_production() { "info" } else { "debug" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let (superuser, created) = superuser::load_or_create(&config.superuser_token_path)
        .map_err(|e| startup_error("superuser token", e))?;
    if created {
        if config.env.is_production() {
            log::warn!(
                "superuser token written to {}; restrict access to this file",
                config.superuser_token_path.display()
            );
        } else {
            log::info!("superuser token created: {}", superuser.as_str());
        }
    }

    let stores = match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .map_err(|e| startup_error("connect to database", e))?;

            sqlx::migrate!()
                .run(&pool)
                .await
                .map_err(|e| startup_error("run migrations", e))?;

            Stores::from_shared(Arc::new(PgStore::new(pool)))
        }
        None => {
            log::warn!("DATABASE_URL is not set, data lives in memory and is lost on restart");
            Stores::from_shared(Arc::new(MemoryStore::new()))
        }
    };

    if config.plans.is_empty() {
        log::warn!("no STRIPE_PLAN_* price ids configured, checkout is disabled");
    }

    let state = AppState::new(&config, stores, superuser)
        .map_err(|e| startup_error("password hasher", e))?;
    let state = web::Data::new(state);

    log::info!("listening on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
