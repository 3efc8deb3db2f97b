use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use fx_core::Config;
use fx_gateway::{handlers, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();

    info!("Starting FX Gateway...");

    let config = Config::from_env().expect("Failed to load configuration");
    let host = config.host.clone();
    let port = config.port;
    let workers = config.workers;

    let state = Arc::new(AppState::initialise(config).expect("Failed to initialise engines"));

    info!("Engines initialised; listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .configure(handlers::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
