#![deny(missing_docs)]
//! Evolve server executable.
//!
//! Serves repository suggestions over HTTP, records them as evolution logs,
//! and opens pull requests for the ones users accept.

mod ai;
mod db;
mod github;
mod models;
mod openapi;
mod routes;
mod schema;
mod store;
mod workflows;

#[cfg(not(test))]
use std::io;
#[cfg(not(test))]
use std::sync::Arc;

#[cfg(not(test))]
use actix_cors::Cors;
#[cfg(not(test))]
use actix_web::{App, HttpServer, http::header, web};
#[cfg(not(test))]
use dotenvy::dotenv;
#[cfg(not(test))]
use evolve_core::ProviderConfig;
#[cfg(not(test))]
use log::info;

#[allow(unused_imports)]
use std::str::FromStr;

#[cfg(not(test))]
use crate::ai::{build_engine, referer_from_env};
#[cfg(not(test))]
use crate::db::init_pool;
#[cfg(not(test))]
use crate::github::{GitHubApiClient, GitHubClient};
#[cfg(not(test))]
use crate::routes::{AppState, apply, logs, openapi_json, preview, reject, status, suggest};
#[cfg(not(test))]
use crate::store::{EvolutionLogStore, MemoryLogStore, PgLogStore};
#[cfg(not(test))]
use crate::workflows::WorkflowService;

#[cfg(not(test))]
fn log_store_from_env() -> io::Result<Arc<dyn EvolutionLogStore>> {
    let mode = std::env::var("EVOLVE_STORE").unwrap_or_else(|_| "postgres".to_string());
    if mode.trim().eq_ignore_ascii_case("memory") {
        info!("evolution logs are kept in memory");
        return Ok(Arc::new(MemoryLogStore::new()));
    }
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| io::Error::other("DATABASE_URL must be set (or EVOLVE_STORE=memory)"))?;
    let pool = init_pool(&database_url).map_err(io::Error::other)?;
    Ok(Arc::new(PgLogStore::new(pool)))
}

#[cfg(not(test))]
fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let store = log_store_from_env()?;

    // Blocking clients must exist before the Actix runtime starts.
    let engine = build_engine(ProviderConfig::from_env(), &referer_from_env())
        .map_err(io::Error::other)?;
    let github: Arc<dyn GitHubClient> =
        Arc::new(GitHubApiClient::from_env().map_err(io::Error::other)?);
    let workflow = WorkflowService::from_env(github.clone());

    let state = web::Data::new(AppState {
        engine: Arc::new(engine),
        github,
        store,
        workflow,
    });

    let origins = std::env::var("EVOLVE_UI_ORIGINS")
        .unwrap_or_else(|_| "http://127.0.0.1:3000,http://localhost:3000".to_string());
    let allowed_origins: Vec<String> = origins
        .split(',')
        .map(|value| value.trim())
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    let listen_addr = std::env::var("EVOLVE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listen_port =
        u16::from_str(&std::env::var("EVOLVE_PORT").unwrap_or_else(|_| "8080".to_string()))
            .map_err(|err| io::Error::other(format!("EVOLVE_PORT must be a u16 number: {err}")))?;
    info!("listening on {listen_addr}:{listen_port}");

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .max_age(3600);
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            App::new()
                .wrap(actix_web::middleware::Logger::default())
                .wrap(cors)
                .app_data(state.clone())
                .service(suggest)
                .service(preview)
                .service(apply)
                .service(status)
                .service(reject)
                .service(logs)
                .service(openapi_json)
        })
        .bind((listen_addr, listen_port))?
        .run()
        .await
    })
}

#[cfg(test)]
fn main() {}
