use super::iter::{self, CancelHandle, LazyIter};
use super::{Element, Shared};
use crate::core::{Result, StoreConfig, StoreError};
use crate::persist::SaveStats;
use crate::store::{ReadGuard, Store, WriteGuard};
use async_trait::async_trait;
use im::Vector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered sequence behind a [`List`] guard.
///
/// Read methods are reachable through both guards; mutating methods need a
/// [`WriteGuard`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListData<T: Clone> {
    items: Vector<T>,
}

impl<T: Clone> Default for ListData<T> {
    fn default() -> Self {
        Self { items: Vector::new() }
    }
}

impl<T: Clone> ListData<T> {
    /// Element at `index`.
    pub fn get(&self, index: usize) -> Result<&T> {
        self.items.get(index).ok_or(StoreError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    /// First element matching `predicate`, scanning from index 0.
    pub fn find<F>(&self, mut predicate: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().find(|item| predicate(*item))
    }

    /// Every element matching `predicate`, in index order.
    pub fn find_all<F>(&self, mut predicate: F) -> Vec<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().filter(|item| predicate(*item)).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrowing iterator, for use while the guard is held.
    pub fn iter(&self) -> im::vector::Iter<'_, T> {
        self.items.iter()
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.items.len();
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::IndexOutOfRange { index, len }),
        }
    }

    pub fn append(&mut self, value: T) {
        self.items.push_back(value);
    }

    /// Appends `value` unless an element equal to it under `equal` exists.
    ///
    /// Returns true if the value was appended.
    pub fn append_unique<F>(&mut self, value: T, mut equal: F) -> bool
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.items.iter().any(|existing| equal(existing, &value)) {
            return false;
        }
        self.items.push_back(value);
        true
    }

    /// Replaces the whole list.
    pub fn overwrite<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.items = items.into_iter().collect();
    }
}

impl<T: Element> ListData<T> {
    /// Streams the elements present right now, in index order.
    ///
    /// The producer works on a snapshot and takes no lock; hold at least a
    /// shared guard while consuming so the result reflects a state other
    /// holders agree on.
    pub fn iterate(&self) -> (LazyIter<T>, CancelHandle) {
        iter::spawn(self.items.clone())
    }
}

/// Thread-safe list persisted as a whole to a file.
///
/// Cloning yields another handle to the same list.
pub struct List<T: Element> {
    shared: Arc<Shared<ListData<T>>>,
}

impl<T: Element> Clone for List<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Element> List<T> {
    /// Loads the list stored at `location` with default settings.
    ///
    /// The format follows the suffix (`.json`, `.msgpack`, `.mpk`). A
    /// missing file yields an empty list and creates its directory.
    pub async fn load(location: &str) -> Result<Self> {
        Self::load_with_config(location, StoreConfig::default()).await
    }

    pub async fn load_with_config(location: &str, config: StoreConfig) -> Result<Self> {
        let shared = Shared::load(location, config).await?;
        Ok(Self { shared })
    }

    /// Writes the current contents now, bypassing the scheduler.
    ///
    /// Takes a shared lock: awaiting this while holding this list's write
    /// guard in the same task never completes.
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
impl<T: Element> Store for List<T> {
    type Data = ListData<T>;

    async fn lock(&self) -> WriteGuard<'_, ListData<T>> {
        self.shared.lock().await
    }

    async fn lock_shared(&self) -> ReadGuard<'_, ListData<T>> {
        self.shared.lock_shared().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn data(items: &[i32]) -> ListData<i32> {
        let mut list = ListData::default();
        list.overwrite(items.iter().copied());
        list
    }

    #[test]
    fn test_get_and_set() {
        let mut list = data(&[1, 2, 3]);
        assert_eq!(*list.get(1).unwrap(), 2);

        list.set(1, 20).unwrap();
        assert_eq!(*list.get(1).unwrap(), 20);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_out_of_range() {
        let mut list = data(&[1, 2]);
        assert!(matches!(
            list.get(2),
            Err(StoreError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            list.set(7, 0),
            Err(StoreError::IndexOutOfRange { index: 7, len: 2 })
        ));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_find_and_find_all() {
        let list = data(&[5, 8, 11, 14]);
        assert_eq!(list.find(|x| x % 2 == 0), Some(&8));
        assert_eq!(list.find(|x| *x > 100), None);
        assert_eq!(list.find_all(|x| x % 2 == 0), vec![&8, &14]);
        assert!(list.find_all(|x| *x < 0).is_empty());
    }

    #[test]
    fn test_append_unique() {
        let mut list = data(&[1]);
        assert!(list.append_unique(2, |a, b| a == b));
        assert_eq!(list.len(), 2);
        assert!(!list.append_unique(2, |a, b| a == b));
        assert_eq!(list.len(), 2);
        // Equality is whatever the caller says it is.
        assert!(!list.append_unique(12, |a, b| a % 10 == b % 10));
    }

    #[test]
    fn test_overwrite_replaces_everything() {
        let mut list = data(&[1, 2, 3]);
        list.overwrite(vec![9]);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![9]);

        list.overwrite(Vec::new());
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_iterate_is_positional() {
        let list = data(&[3, 1, 2]);
        let (iter, _cancel) = list.iterate();
        assert_eq!(iter.collect::<Vec<_>>().await, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_iterate_sees_state_at_start() {
        let mut list = data(&[1, 2]);
        let (iter, _cancel) = list.iterate();
        list.append(3);
        assert_eq!(iter.collect::<Vec<_>>().await, vec![1, 2]);
    }
}
