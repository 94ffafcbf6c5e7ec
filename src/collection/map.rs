use super::iter::{self, CancelHandle, LazyIter};
use super::{Element, Shared};
use crate::core::{Result, StoreConfig};
use crate::persist::SaveStats;
use crate::store::{ReadGuard, Store, WriteGuard};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key/value pair produced by [`MapData::iterate_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub key: String,
    pub value: T,
}

/// String-keyed mapping behind a [`Map`] guard. Iteration order is
/// unspecified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapData<T: Clone> {
    entries: im::HashMap<String, T>,
}

impl<T: Clone> Default for MapData<T> {
    fn default() -> Self {
        Self {
            entries: im::HashMap::new(),
        }
    }
}

impl<T: Clone> MapData<T> {
    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn find<F>(&self, mut predicate: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.entries.values().find(|value| predicate(*value))
    }

    pub fn find_all<F>(&self, mut predicate: F) -> Vec<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.entries.values().filter(|value| predicate(*value)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites the value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), value);
    }

    /// Replaces the whole map.
    pub fn overwrite<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, T)>,
    {
        self.entries = entries.into_iter().collect();
    }
}

impl<T: Element> MapData<T> {
    /// Streams the values present right now.
    pub fn iterate(&self) -> (LazyIter<T>, CancelHandle) {
        iter::spawn(self.entries.clone().into_iter().map(|(_, value)| value))
    }

    /// Streams the key/value pairs present right now.
    pub fn iterate_entries(&self) -> (LazyIter<Entry<T>>, CancelHandle) {
        iter::spawn(
            self.entries
                .clone()
                .into_iter()
                .map(|(key, value)| Entry { key, value }),
        )
    }
}

/// Thread-safe string-keyed map persisted as a whole to a file.
///
/// Cloning yields another handle to the same map.
pub struct Map<T: Element> {
    shared: Arc<Shared<MapData<T>>>,
}

impl<T: Element> Clone for Map<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Element> Map<T> {
    /// Loads the map stored at `location` with default settings.
    pub async fn load(location: &str) -> Result<Self> {
        Self::load_with_config(location, StoreConfig::default()).await
    }

    pub async fn load_with_config(location: &str, config: StoreConfig) -> Result<Self> {
        let shared = Shared::load(location, config).await?;
        Ok(Self { shared })
    }

    /// Writes the current contents now, bypassing the scheduler.
    pub async fn save(&self) -> Result<()> {
        self.shared.save().await
    }

    /// Drops any pending autosave and writes the current contents.
    pub async fn flush(&self) -> Result<()> {
        self.shared.flush().await
    }

    pub fn location(&self) -> &str {
        self.shared.location()
    }

    pub fn config(&self) -> &StoreConfig {
        self.shared.config()
    }

    pub fn stats(&self) -> SaveStats {
        self.shared.stats()
    }
}

#[async_trait]
impl<T: Element> Store for Map<T> {
    type Data = MapData<T>;

    async fn lock(&self) -> WriteGuard<'_, MapData<T>> {
        self.shared.lock().await
    }

    async fn lock_shared(&self) -> ReadGuard<'_, MapData<T>> {
        self.shared.lock_shared().await
    }
}
