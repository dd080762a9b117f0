use actix_web::{middleware::Logger, web, App, HttpServer};
use aram_lobby_server::{
    config::settings,
    db::{MemoryRankStore, PgRankStore, RankStore},
    game::registry::{Context, Registry},
    http, metrics, ws,
};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    // Configuration
    let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
    let init_schemas = env::var("INIT_SCHEMAS").is_ok_and(|v| v == "1" || v == "true");

    // Rank store: Postgres when configured, in-memory otherwise
    let store: Arc<dyn RankStore> = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await
                .expect("Failed to create Postgres pool");
            let store = PgRankStore::new(db_pool);
            if init_schemas {
                store.create_tables().await.expect("Failed to create tables");
            }
            Arc::new(store)
        }
        Err(_) => {
            log::warn!("DATABASE_URL not set, rank scores are kept in memory");
            Arc::new(MemoryRankStore::new())
        }
    };

    let registry = web::Data::new(Registry::new(Context::new(settings().clone(), store)));
    log::info!("listening on {server_addr}");

    // Start HTTP + WS server
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .app_data(registry.clone())
            .configure(http::routes::init_routes)
            .configure(ws::routes::init_routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}
