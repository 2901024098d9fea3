use std::sync::Arc;

use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use chrono::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gitserve::services::auth::{AccessGate, SigninCredentials};
use gitserve::services::directory::CheckoutDirectory;
use gitserve::{handlers, AppState, Config};

/// Liveness probe, always 200 "OK"
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Build the access gate when sign-in credentials and a token secret are
/// all configured; otherwise the public endpoints stay disabled.
fn setup_access_gate(config: &Config) -> Option<AccessGate> {
    let username = config.signin_username.as_ref()?;
    let password_hash = config.signin_password_hash.as_ref()?;
    let secret = config.token_secret.as_ref()?;
    Some(AccessGate::new(
        SigninCredentials::new(username, password_hash),
        secret.as_bytes().to_vec(),
        Duration::seconds(config.token_ttl_secs as i64),
    ))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitserve=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    let repositories = config
        .load_repositories()
        .expect("Failed to load repository config");

    info!(
        "Starting gitserve on {}:{} with {} repositories",
        config.host,
        config.port,
        repositories.len()
    );

    // Clone every configured repository; any clone failure is fatal here.
    let directory = CheckoutDirectory::open(&config.data_directory, &repositories)
        .expect("Failed to set up repository checkouts");
    info!("All repository checkouts ready");

    let access_gate = setup_access_gate(&config);
    if access_gate.is_none() {
        info!("Sign-in credentials or token secret not configured, public endpoints disabled");
    }
    if config.webhook_secret.is_none() {
        info!("Webhook secret not configured, webhook endpoint disabled");
    }

    let app_state = web::Data::new(AppState {
        directory: Arc::new(directory),
        access_gate,
        webhook_secret: config.webhook_secret.clone(),
    });

    let server_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure_refresh_routes)
            .configure(handlers::configure_webhook_routes)
            .configure(handlers::configure_public_routes)
            .configure(handlers::configure_content_routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}
