mod auth;
mod config;
mod database;
mod error;
mod model;
mod routes;
mod service;
mod validation;

use actix_identity::IdentityService;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use auth::Hasher;
use config::Config;
use log::{info, warn};

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("movieshelf=debug,actix_web=info"),
    )
    .init();

    if !config.session_key_configured {
        warn!("SESSION_KEY is not set, using the insecure development key");
    }

    let db = config.open_database().with_context(|| {
        format!("failed to open database at {}", config.database_path.display())
    })?;
    let hasher = Hasher {
        cost: config.bcrypt_cost,
    };
    let session_key = config.session_key.clone();
    let cookie_secure = config.cookie_secure;

    info!("listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(auth::session_policy(
                &session_key,
                cookie_secure,
            )))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(hasher))
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
