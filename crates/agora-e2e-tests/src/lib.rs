use std::time::Duration;

use agora_app::state::AppState;
use agora_dal::user::{CreateUser, User, UserRepository};
use agora_server::config::{Parser, ServerConfig};
use agora_types::{
    claim::{ApiClaim, Role},
    general::ValidEmail,
};
use anyhow::{Result, anyhow};
use rand::Rng as _;
use reqwest::{
    Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use tempfile::TempDir;
use tracing::{debug, info};

pub mod rest;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

/// Keeps temporary data directory alive for the duration of the test
pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
}

pub fn test_config(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix(format!("{}_", test_name))?;
    let data_dir = tmp_data_dir.path().to_string_lossy().to_string();
    let port = random_port()?.to_string();
    let args = &[
        "agora-e2e-tests",
        "--data-dir",
        &data_dir,
        "--port",
        &port,
        "--insecure-cookies",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
        },
    ))
}

pub async fn prepare_env(test_name: &str) -> Result<(ServerConfig, ConfigGuard)> {
    test_config(test_name)
}

/// URL where the test server started from `args` can be reached
pub fn server_url(args: &ServerConfig) -> Result<Url> {
    let url = Url::parse(&format!("http://127.0.0.1:{}/", args.port))?;
    Ok(url)
}

async fn wait_for_server(base_url: &Url) -> Result<()> {
    let client = reqwest::Client::new();
    let url = base_url.join("health")?;
    for _ in 0..50 {
        match client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    Err(anyhow!("Server did not start at {base_url}"))
}

/// Starts server in background task, returns its state, once server responds
pub async fn spawn_server(args: ServerConfig) -> Result<AppState> {
    let state = agora_server::build_state(&args).await?;
    let base_url = server_url(&args)?;
    let server_state = state.clone();
    tokio::spawn(async move {
        let res = agora_server::run_graceful_with_state(
            args,
            server_state,
            futures::future::pending::<()>(),
        )
        .await;
        if let Err(e) = res {
            tracing::error!("Server failed: {e}");
        }
    });
    wait_for_server(&base_url).await?;
    info!("Server started at {base_url}");
    Ok(state)
}

#[derive(Debug, Clone, Copy)]
pub enum TestUser {
    Admin,
    Librarian,
    Member,
}

impl TestUser {
    pub fn roles(&self) -> Vec<Role> {
        match self {
            TestUser::Admin => vec![Role::Admin],
            TestUser::Librarian => vec![Role::Librarian],
            TestUser::Member => vec![Role::Member],
        }
    }

    pub fn username(&self) -> &'static str {
        match self {
            TestUser::Admin => "admin",
            TestUser::Librarian => "librarian",
            TestUser::Member => "member",
        }
    }
}

pub const TEST_PASSWORD: &str = "password123";

/// Creates user directly in database and issues token for it
pub async fn create_user(state: &AppState, username: &str, roles: &[Role]) -> Result<(User, String)> {
    let repository = UserRepository::new(state.pool().clone());
    let user = repository
        .create(CreateUser {
            username: username.to_string(),
            email: ValidEmail::cheat(format!("{username}@example.com")),
            password: Some(TEST_PASSWORD.to_string()),
            roles: Some(roles.iter().map(|r| r.to_string()).collect()),
            date_of_birth: None,
            profile_photo: None,
        })
        .await?;
    let token = state
        .tokens()
        .issue(ApiClaim::new_expired(user.id, roles.iter().copied()))?;
    debug!("Created test user {username} with id {}", user.id);
    Ok((user, token))
}

/// Client sending the token with every request
pub fn client_with_token(token: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;
    Ok(client)
}

pub struct TestEnv {
    pub state: AppState,
    pub base_url: Url,
    pub user: User,
}

impl TestEnv {
    pub fn url(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .unwrap_or_else(|e| panic!("Invalid test path {path}: {e}"))
    }

    /// Another authenticated user on the same server
    pub async fn other_user(&self, username: &str, roles: &[Role]) -> Result<(User, reqwest::Client)> {
        let (user, token) = create_user(&self.state, username, roles).await?;
        Ok((user, client_with_token(&token)?))
    }
}

/// Spawns server and returns client authenticated as `user`
pub async fn launch_env(args: ServerConfig, user: TestUser) -> Result<(reqwest::Client, TestEnv)> {
    let base_url = server_url(&args)?;
    let state = spawn_server(args).await?;
    let (created, token) = create_user(&state, user.username(), &user.roles()).await?;
    let client = client_with_token(&token)?;
    Ok((
        client,
        TestEnv {
            state,
            base_url,
            user: created,
        },
    ))
}
