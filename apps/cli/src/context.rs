//! Wires the local store, the backend client and the sync engine.

use std::sync::Arc;
use std::time::Duration;

use adjunct_backend::{BackendClient, BackendConfig};
use adjunct_core::sync::{SyncEngine, SyncEngineConfig};
use adjunct_storage_sqlite::LocalStore;
use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{BackendArgs, StoreArgs};

pub struct AppContext {
    pub store: Arc<LocalStore>,
    backend_args: BackendArgs,
}

impl AppContext {
    /// Opens and initializes the local store. Failure here is fatal.
    pub async fn open(store_args: &StoreArgs, backend_args: BackendArgs) -> Result<Self> {
        let store = LocalStore::open(&store_args.db)
            .with_context(|| format!("opening local store at {}", store_args.db.display()))?;
        store
            .initialize()
            .await
            .context("initializing local store")?;
        info!(path = %store_args.db.display(), "local store ready");
        Ok(Self {
            store: Arc::new(store),
            backend_args,
        })
    }

    pub fn backend(&self) -> Result<Arc<BackendClient>> {
        let url = self
            .backend_args
            .backend_url
            .clone()
            .context("backend URL missing: pass --backend-url or set ADJUNCT_BACKEND_URL")?;
        let key = self
            .backend_args
            .api_key
            .clone()
            .context("API key missing: pass --api-key or set ADJUNCT_BACKEND_KEY")?;
        let mut config = BackendConfig::new(url, key);
        config.request_timeout = self.call_timeout();
        Ok(Arc::new(BackendClient::new(config)?))
    }

    pub fn engine(&self) -> Result<Arc<SyncEngine>> {
        let config = SyncEngineConfig {
            call_timeout: self.call_timeout(),
            ..SyncEngineConfig::default()
        };
        Ok(Arc::new(SyncEngine::with_config(
            self.store.clone(),
            self.backend()?,
            config,
        )))
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_args.timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_args(url: Option<&str>, key: Option<&str>) -> BackendArgs {
        BackendArgs {
            backend_url: url.map(String::from),
            api_key: key.map(String::from),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn local_commands_work_without_backend_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store_args = StoreArgs {
            db: dir.path().join("app.db"),
        };
        let ctx = AppContext::open(&store_args, backend_args(None, None))
            .await
            .unwrap();
        let err = ctx.engine().err().expect("no backend configured");
        assert!(err.to_string().contains("ADJUNCT_BACKEND_URL"));
    }

    #[tokio::test]
    async fn engine_uses_configured_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let store_args = StoreArgs {
            db: dir.path().join("app.db"),
        };
        let ctx = AppContext::open(
            &store_args,
            backend_args(Some("http://127.0.0.1:9"), Some("anon")),
        )
        .await
        .unwrap();
        let engine = ctx.engine().unwrap();
        assert_eq!(engine.config().call_timeout, Duration::from_secs(5));
    }
}
