use std::sync::Arc;

use lms_server::config::Config;
use lms_server::state::AppState;
use lms_server::storage::memory::MemoryStorage;
use lms_server::storage::postgres::{self, PgStorage};
use lms_server::storage::Storage;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            let pool = postgres::connect(url, config.max_connections).await?;
            Arc::new(PgStorage::new(pool))
        }
        None => {
            log::warn!("DATABASE_URL is not set, records will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };
    let backend = storage.backend();

    let app = lms_server::app(AppState::new(&config, storage));
    let listener = TcpListener::bind(config.bind_address()).await?;
    log::info!(
        service = config.service_name.as_str(), storage = backend;
        "Starting LMS HTTP Server on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
