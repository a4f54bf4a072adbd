use actix_cors::Cors;
use actix_middleware::{not_found, CorrelationIdMiddleware, Logging};
use actix_web::{http::header, web, App, HttpServer};
use anyhow::Context;

use user_service::{
    background::spawn_session_sweeper,
    cli::{parse_command, Command},
    config::CorsConfig,
    db, routes, telemetry, AppState, Config,
};

fn cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default();
    for origin in &config.allowed_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allowed_methods(vec!["GET", "POST", "PATCH"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600)
}

async fn migrate(config: &Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("database migrations applied");
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let bind_address = (config.app.host.clone(), config.app.port);
    let sweep_interval = config.session.sweep_interval();

    let state = AppState::build(config).await?;
    // Surface a bad version range before any worker starts
    routes::api_router(&state).context("invalid API version configuration")?;

    let sweeper = spawn_session_sweeper(
        state.sessions.cache().clone(),
        state.sessions.clock().clone(),
        sweep_interval,
    );

    tracing::info!(
        host = %bind_address.0,
        port = bind_address.1,
        "starting HTTP server"
    );

    let server_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .configure(routes::configure(server_state.clone()))
            .default_service(web::to(not_found))
            .wrap(cors(&server_state.config.cors))
            .wrap(Logging)
            .wrap(CorrelationIdMiddleware)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}:{}", bind_address.0, bind_address.1))?
    .shutdown_timeout(30)
    .run()
    .await;

    tracing::info!("server stopped, shutting down background tasks");
    sweeper.abort();
    if let Some(pool) = &state.db {
        pool.close().await;
    }

    result.context("HTTP server failed")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let command = parse_command(std::env::args().skip(1))?;
    let config = Config::from_env().context("failed to load configuration")?;
    telemetry::init(&config.log);

    tracing::info!(
        version = %config.app.server_version,
        env = %config.app.env,
        ?command,
        "user-service starting"
    );

    match command {
        Command::Migrate => migrate(&config).await,
        Command::Serve => serve(config).await,
    }
}
