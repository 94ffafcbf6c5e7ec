//! The lock contract shared by every collection.
//!
//! A [`Store`] hands out a [`WriteGuard`] for exclusive access and a
//! [`ReadGuard`] for shared access. Releasing a write guard is what
//! schedules an autosave; nothing else does.
//!
//! The `with_*` helpers scope a guard around a closure so the lock is
//! released on every exit path, including `Err` returns and panics.

pub mod guard;

pub use guard::{ReadGuard, WriteGuard};

use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    /// The data a guard dereferences to.
    type Data: Send + Sync;

    /// Acquires the exclusive lock.
    async fn lock(&self) -> WriteGuard<'_, Self::Data>;

    /// Acquires a shared lock.
    async fn lock_shared(&self) -> ReadGuard<'_, Self::Data>;
}

/// Runs `f` under a shared lock.
pub async fn with_read<S, F, R>(store: &S, f: F) -> R
where
    S: Store + ?Sized,
    F: FnOnce(&S::Data) -> R,
{
    let guard = store.lock_shared().await;
    f(&guard)
}

/// Runs `f` under the exclusive lock, scheduling a save on release.
pub async fn with_write<S, F, R>(store: &S, f: F) -> R
where
    S: Store + ?Sized,
    F: FnOnce(&mut S::Data) -> R,
{
    let mut guard = store.lock().await;
    f(&mut guard)
}

/// Same as [`with_read`] for a fallible `f`.
pub async fn try_with_read<S, F, R, E>(store: &S, f: F) -> Result<R, E>
where
    S: Store + ?Sized,
    F: FnOnce(&S::Data) -> Result<R, E>,
{
    let guard = store.lock_shared().await;
    f(&guard)
}

/// Same as [`with_write`] for a fallible `f`.
///
/// The save is scheduled even when `f` fails, since it may have mutated
/// the data before returning the error.
pub async fn try_with_write<S, F, R, E>(store: &S, f: F) -> Result<R, E>
where
    S: Store + ?Sized,
    F: FnOnce(&mut S::Data) -> Result<R, E>,
{
    let mut guard = store.lock().await;
    f(&mut guard)
}
