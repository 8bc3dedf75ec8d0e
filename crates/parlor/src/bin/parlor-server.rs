//! Parlor server binary. Configured through `PARLOR_*` environment
//! variables, optionally from a `.env` file.

use parlor::prelude::*;
use tracing_subscriber::EnvFilter;

/// Messages kept by the in-memory store when no history file is set.
const IN_MEMORY_RETAIN: usize = 1000;

#[tokio::main]
async fn main() -> Result<(), ParlorError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parlor=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let gate = SharedSecretGate::new(config.secret.clone());
    let builder = ParlorServerBuilder::from_config(&config);

    match &config.history_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "persisting history to file");
            serve(builder.build(gate, JsonLinesStore::new(path)).await?).await
        }
        None => {
            tracing::info!("no history file configured, keeping history in memory");
            serve(builder.build(gate, InMemoryStore::new(IN_MEMORY_RETAIN)).await?).await
        }
    }
}

async fn serve<A: Authenticator>(server: ParlorServer<A, JsonCodec>) -> Result<(), ParlorError> {
    let room = server.room();
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            let _ = room.shutdown().await;
            Ok(())
        }
    }
}
