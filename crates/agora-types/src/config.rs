use clap::Parser;
use std::path::PathBuf;

/// Storage settings shared by the server and the admin CLI
#[derive(Debug, Clone, Parser)]
pub struct BackendConfig {
    #[arg(
        long,
        env = "AGORA_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/agora.db, where data-dir is set by --data-dir"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "AGORA_DATA_DIR",
        help = "Data directory (database, secret), default is system default like ~/.local/share/agora",
        default_value_os_t = default_data_dir()
    )]
    data_dir: PathBuf,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("agora"))
        .unwrap_or_else(|| PathBuf::from("agora"))
}

impl BackendConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/agora.db", self.data_dir.display()))
    }
}
