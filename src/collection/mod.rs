//! Persisted collections.
//!
//! [`List`] and [`Map`] are cheap handles around a shared core that owns
//! the data, its readers-writer lock, the backing location and the
//! autosave scheduler. All data access goes through a guard obtained
//! from [`Store::lock`](crate::store::Store::lock) or
//! [`Store::lock_shared`](crate::store::Store::lock_shared).

pub mod iter;
pub mod list;
pub mod map;

pub use iter::{CancelHandle, IterStatus, LazyIter};
pub use list::{List, ListData};
pub use map::{Entry, Map, MapData};

use crate::core::{Result, StoreConfig, StoreError};
use crate::persist::backend;
use crate::persist::scheduler::Persist;
use crate::persist::{Format, SaveScheduler, SaveStats};
use crate::store::{ReadGuard, WriteGuard};
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Bounds every stored element must satisfy.
pub trait Element: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Element for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Data structure a collection persists as a whole.
pub(crate) trait Snapshot:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
}

impl<D> Snapshot for D where D: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {}

pub(crate) struct Shared<D> {
    data: RwLock<D>,
    location: String,
    format: Format,
    config: StoreConfig,
    scheduler: SaveScheduler,
    /// Serializes snapshot writes so they reach disk in lock order.
    io_lock: Mutex<()>,
}

impl<D: Snapshot> Shared<D> {
    pub(crate) async fn load(location: &str, config: StoreConfig) -> Result<Arc<Self>> {
        config.validate().map_err(StoreError::InvalidConfig)?;
        let format = Format::from_location(location)?;
        let runtime = Handle::try_current().map_err(|e| StoreError::Runtime(e.to_string()))?;
        let data: D = backend::load(location, format, config.dir_mode).await?;
        debug!(location, ?format, "collection loaded");

        Ok(Arc::new_cyclic(|weak: &Weak<Self>| {
            let target: Weak<dyn Persist> = weak.clone();
            Shared {
                scheduler: SaveScheduler::new(target, location, &config, runtime),
                data: RwLock::new(data),
                location: location.to_string(),
                format,
                config,
                io_lock: Mutex::new(()),
            }
        }))
    }

    pub(crate) async fn lock(&self) -> WriteGuard<'_, D> {
        WriteGuard::new(self.data.write().await, &self.scheduler)
    }

    pub(crate) async fn lock_shared(&self) -> ReadGuard<'_, D> {
        ReadGuard::new(self.data.read().await)
    }

    pub(crate) async fn save(&self) -> Result<()> {
        let _io = self.io_lock.lock().await;
        // Structural clone: cheap for the persistent structures used as
        // collection data, and it keeps writers unblocked during disk I/O.
        let snapshot = self.data.read().await.clone();
        backend::store(&self.location, self.format, self.config.dir_mode, &snapshot).await
    }

    pub(crate) async fn flush(&self) -> Result<()> {
        self.scheduler.cancel_pending();
        self.save().await
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> SaveStats {
        self.scheduler.stats()
    }
}

impl<D: Snapshot> Persist for Shared<D> {
    fn persist(self: Arc<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move { self.save().await })
    }
}
