use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::{ClientConfig, Config};
use crate::query::DriveQuery;
use crate::types::error::GdrmError;
use crate::types::{DeletionStatistics, ObjectPage};

pub mod drive;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Factory trait for creating Storage instances.
#[async_trait]
pub trait StorageFactory {
    async fn create(
        config: Config,
        client_config: ClientConfig,
        stats_sender: Sender<DeletionStatistics>,
    ) -> Result<Storage>;
}

/// Remote operations needed by the deletion pipeline.
///
/// Implementations must be safe to share between deletion workers: every
/// worker holds its own clone, and clones share the underlying client.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Fetch one page of objects matching `query`.
    ///
    /// Shared-drive items must be included. Failures are returned as-is;
    /// the caller decides that listing failures are fatal.
    async fn list_objects_page(
        &self,
        query: &DriveQuery,
        page_token: Option<String>,
        page_size: i32,
    ) -> Result<ObjectPage>;

    /// Delete a single object by id.
    ///
    /// A "not found" response must be reported as
    /// [`GdrmError::NotFoundOnDelete`] so that callers can tell it apart
    /// from real failures.
    async fn delete_object(&self, id: &str) -> Result<()>;

    /// Get the statistics sender channel.
    fn get_stats_sender(&self) -> Sender<DeletionStatistics>;

    /// Send a statistics event through the channel.
    async fn send_stats(&self, stats: DeletionStatistics);
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Create the Drive storage for the deletion pipeline.
///
/// Fails with [`GdrmError::InvalidConfig`] if no client configuration is
/// present, or [`GdrmError::Credential`] if the service-account key cannot
/// be loaded.
pub async fn create_storage(
    config: Config,
    stats_sender: Sender<DeletionStatistics>,
) -> Result<Storage> {
    let Some(client_config) = config.client_config.clone() else {
        return Err(GdrmError::InvalidConfig(
            "no Drive client configuration was provided".to_string(),
        )
        .into());
    };

    drive::DriveStorageFactory::create(config, client_config, stats_sender).await
}
