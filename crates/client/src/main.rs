use std::sync::Arc;

use anyhow::Context;

use idbridge_client::{
    Backend, ClientConfig, FileFlagStore, FlagStore, HttpBackend, IdentityProvider,
    IdentitySessionManager, SessionPhase, StaticTokenProvider, TokenSource,
};
use idbridge_observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    idbridge_observability::init_with(&ObservabilityConfig::from_env());

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let provider = Arc::new(StaticTokenProvider::from_env().context("invalid token configuration")?);

    let tokens: Arc<dyn TokenSource> = provider.clone();
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config, tokens));
    let store: Arc<dyn FlagStore> = match &config.flag_store_path {
        Some(path) => Arc::new(FileFlagStore::open(path)?),
        None => Arc::new(FileFlagStore::open_default()?),
    };
    let provider: Arc<dyn IdentityProvider> = provider;

    let manager = IdentitySessionManager::new(&config, provider, backend, store);

    if !manager.init().await? {
        anyhow::bail!("no authenticated session; is IDBRIDGE_TOKEN still valid?");
    }
    tracing::info!(phase = ?manager.phase(), "session ready");

    if manager.phase() == SessionPhase::AuthenticatedUnsynced {
        let outcome = manager.sync().await;
        tracing::info!(?outcome, "sync finished");
    }

    let identity = manager.resolve().await.context("failed to resolve identity")?;
    println!("{}", serde_json::to_string_pretty(&identity)?);

    Ok(())
}
