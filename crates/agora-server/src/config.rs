use std::{path::PathBuf, time::Duration};

use crate::error::Result;
use agora_app::state::AppConfig;
use agora_types::config::BackendConfig;
pub use clap::Parser;

#[derive(Debug, Clone, clap::Parser)]
#[command(version, about = "Agora server - book catalog, libraries, blog and social posts")]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "AGORA_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "AGORA_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[arg(
        long,
        env = "AGORA_TOKEN_VALIDITY",
        default_value = "1 day",
        help = "Default token validity in human friendly format (e.g. 1d, 1h, 1m, 1s - or combined)",
        value_parser = humantime::parse_duration
    )]
    pub token_validity: Duration,

    #[arg(
        long,
        env = "AGORA_DEFAULT_PAGE_SIZE",
        default_value = "10",
        value_parser = clap::value_parser!(u32).range(1..=100),
        help = "Page size of listings, when client does not ask for one"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "AGORA_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,

    #[arg(
        long,
        env = "AGORA_INSECURE_COOKIES",
        help = "Do not mark cookies as secure, needed when server is not behind HTTPS"
    )]
    pub insecure_cookies: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.backend.data_dir()
    }

    pub fn database_url(&self) -> String {
        self.backend.database_url()
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            default_page_size: config.default_page_size,
            secure_cookies: !config.insecure_cookies,
        }
    }
}
