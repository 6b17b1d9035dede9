//! A signed-in connection to one gallery backend.
//!
//! Created at session start, closed at logout. Everything that talks to the
//! backend gets its client from here instead of from global state.

use std::sync::Arc;
use tracing::info;

use crate::api::{ApiClient, PhotoSource, RemoteSource};
use crate::config::Config;
use crate::error::FetchError;
use crate::loader::PhotoLoader;
use crate::model::{Container, ContainerRef, SortOrder};

pub struct Session {
    client: Arc<ApiClient>,
    target_batch: u32,
}

impl Session {
    pub fn open(config: &Config) -> Self {
        let client = ApiClient::from_config(&config.server);
        info!("Session opened for {}", client.endpoint());

        Self {
            client: Arc::new(client),
            target_batch: config.loader.target_batch,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Fetch the current date range and size of a container.
    pub async fn container(&self, target: &ContainerRef) -> Result<Container, FetchError> {
        let client = Arc::clone(&self.client);
        let target = target.clone();

        tokio::task::spawn_blocking(move || client.container(&target))
            .await
            .unwrap_or_else(|e| Err(FetchError::Transport(format!("request task failed: {}", e))))
    }

    /// Snapshot `target` and build a loader over it.
    pub async fn loader(&self, target: ContainerRef, order: SortOrder) -> Result<PhotoLoader, FetchError> {
        let container = self.container(&target).await?;
        let source: Arc<dyn PhotoSource> = Arc::new(RemoteSource::new(Arc::clone(&self.client), target));

        Ok(PhotoLoader::with_target_batch(source, container, order, self.target_batch))
    }

    /// End the session. Loaders created from it keep their own client handle
    /// until they are dropped.
    pub fn close(self) {
        info!("Session closed for {}", self.client.endpoint());
    }
}
