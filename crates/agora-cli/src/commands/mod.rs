use agora_dal::Pool;
use agora_types::config::BackendConfig;
use tracing::debug;

pub mod create_user;
pub mod query;

#[allow(async_fn_in_trait)]
pub trait Executor {
    async fn run(self) -> anyhow::Result<()>;
}

/// Opens (or creates) database and brings its schema up to date
pub async fn open_database(backend: &BackendConfig) -> anyhow::Result<Pool> {
    let data_dir = backend.data_dir();
    if !data_dir.is_dir() {
        tokio::fs::create_dir_all(&data_dir).await?;
    }
    let db_url = backend.database_url();
    debug!("Opening database {db_url}");
    let pool = agora_dal::new_pool(&db_url).await?;
    agora_dal::migrate(&pool).await?;
    Ok(pool)
}
