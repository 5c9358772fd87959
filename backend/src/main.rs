mod config;
mod error;
mod job_controller;
mod services;
mod state;
mod storage;

use crate::config::AppConfig;
use crate::job_controller::state::JobsState;
use crate::state::AppState;
use crate::storage::local::LocalObjectStore;
use crate::storage::sqlite::SqliteStore;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = AppConfig::from_env();
    let url = config.bind_url();

    let db = SqliteStore::open(&config.db_path).map_err(io::Error::other)?;
    let mut objects =
        LocalObjectStore::new(&config.storage_dir, &config.signing_secret).map_err(io::Error::other)?;
    for bucket in &config.public_buckets {
        objects = objects.with_public_bucket(bucket);
    }
    let json_limit = config.json_limit_bytes;
    let bind = (config.host.clone(), config.port);
    let app_state = web::Data::new(AppState::new(config, Arc::new(db), Arc::new(objects)));

    // Initialize job controller state
    let (jobs_state, rx) = JobsState::new();

    // Start job updater task
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });

    info!("Server running at {}", url);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(app_state.clone())
            .app_data(web::Data::new(jobs_state.clone()))
            .service(services::schema::configure_routes())
            .service(services::templates::configure_routes())
            .service(services::documents::configure_routes())
            .service(services::storage::configure_routes())
    })
    .bind(bind)?
    .run()
    .await
}
