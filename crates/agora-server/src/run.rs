use std::path::Path;

use crate::config::ServerConfig;
use crate::error::Result;
use agora_app::{
    auth::{auth_router, token::TokenLayer},
    rest_api::{api_router, library, profile},
    state::{AppConfig, AppState},
    user,
};
use agora_auth::TokenManager;
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Router};
use futures::FutureExt;
use tokio::{fs, io::AsyncWriteExt as _};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

const SECRET_LEN: usize = 32;

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state).layer(TraceLayer::new_for_http());

    if !args.no_cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

fn main_router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/api", api_router())
        .merge(library::router())
        .merge(profile::router())
        .nest("/users", user::router())
        .nest("/auth", auth_router(&state))
        // Token is optional on public routes, handlers ask for claim where needed
        .layer(TokenLayer::new(state.clone()))
        .layer(tower_cookies::CookieManagerLayer::new())
        .with_state(state)
        .route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Opens database (running migrations) and loads token secret
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let data_dir = config.data_dir();
    if !data_dir.is_dir() {
        fs::create_dir_all(&data_dir).await?;
        info!("Created data directory {}", data_dir.display());
    }

    let pool = agora_dal::new_pool(&config.database_url()).await?;
    agora_dal::migrate(&pool).await?;

    let secret = read_secret(&data_dir).await?;
    let tokens = TokenManager::new(&secret, config.token_validity);
    let app_config: AppConfig = config.into();
    debug!("Application config: {app_config:?}");
    Ok(AppState::new(app_config, pool, tokens))
}

async fn read_secret(data_dir: &Path) -> Result<Vec<u8>, std::io::Error> {
    let secret_file = data_dir.join("secret");

    let secret = if fs::try_exists(&secret_file).await? {
        fs::read(&secret_file).await?
    } else {
        let random_bytes = rand::random::<[u8; SECRET_LEN]>();
        #[cfg(unix)]
        let mut file = {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;
            {
                // Only current user can read the secret
                let _f = OpenOptions::new()
                    .mode(0o600)
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&secret_file)?;
            }
            fs::File::options().write(true).open(&secret_file).await?
        };
        #[cfg(not(unix))]
        let mut file = fs::File::create(&secret_file).await?;

        file.write_all(&random_bytes).await?;
        random_bytes.to_vec()
    };
    Ok(secret)
}
