use crate::persist::SaveScheduler;
use std::fmt;
use std::ops::{Deref, DerefMut};
use tokio::sync::{RwLockReadGuard, RwLockWriteGuard};

/// Shared access to a collection's data.
///
/// Any number of read guards may coexist. Releasing one has no side
/// effects.
pub struct ReadGuard<'a, D> {
    inner: RwLockReadGuard<'a, D>,
}

impl<'a, D> ReadGuard<'a, D> {
    pub(crate) fn new(inner: RwLockReadGuard<'a, D>) -> Self {
        Self { inner }
    }

    /// Releases the shared lock. Same as dropping the guard.
    pub fn unlock_shared(self) {}
}

impl<D> Deref for ReadGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.inner
    }
}

impl<D: fmt::Debug> fmt::Debug for ReadGuard<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadGuard").field(&*self.inner).finish()
    }
}

/// Exclusive access to a collection's data.
///
/// Releasing the guard schedules an autosave of the collection.
pub struct WriteGuard<'a, D> {
    inner: RwLockWriteGuard<'a, D>,
    // Fields drop in declaration order: the lock is released first, then
    // the scheduler is notified.
    _notify: NotifyOnRelease<'a>,
}

impl<'a, D> WriteGuard<'a, D> {
    pub(crate) fn new(inner: RwLockWriteGuard<'a, D>, scheduler: &'a SaveScheduler) -> Self {
        Self {
            inner,
            _notify: NotifyOnRelease(scheduler),
        }
    }

    /// Releases the exclusive lock and schedules a save. Same as dropping
    /// the guard.
    pub fn unlock(self) {}
}

impl<D> Deref for WriteGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.inner
    }
}

impl<D> DerefMut for WriteGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.inner
    }
}

impl<D: fmt::Debug> fmt::Debug for WriteGuard<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteGuard").field(&*self.inner).finish()
    }
}

struct NotifyOnRelease<'a>(&'a SaveScheduler);

impl Drop for NotifyOnRelease<'_> {
    fn drop(&mut self) {
        self.0.notify_changed();
    }
}
