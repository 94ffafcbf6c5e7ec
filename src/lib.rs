// ============================================================================
// memostore Library
// ============================================================================

//! In-memory lists and maps that persist full snapshots to a file.
//!
//! Every collection is guarded by a readers-writer lock. Releasing the
//! exclusive lock schedules an autosave: saves are debounced (2s of quiet by
//! default) and a burst of changes is written at least once per max delay
//! (10s by default).
//!
//! # Examples
//!
//! ```no_run
//! use memostore::{List, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Foo {
//!     bar: String,
//!     baz: i64,
//! }
//!
//! # async fn run() -> memostore::Result<()> {
//! let foos = List::<Foo>::load("./data/foo.json").await?;
//!
//! {
//!     let mut guard = foos.lock().await;
//!     guard.append(Foo { bar: "aaa".into(), baz: 42 });
//!     guard.append(Foo { bar: "abc".into(), baz: 69 });
//! } // released: an autosave is scheduled
//!
//! let guard = foos.lock_shared().await;
//! let (mut iter, cancel) = guard.iterate();
//! while let Some(foo) = iter.next().await {
//!     println!("{} => {}", foo.bar, foo.baz);
//! }
//! cancel.cancel();
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod core;
pub mod persist;
pub mod store;

// Re-export main types for convenience
pub use collection::{CancelHandle, Element, Entry, IterStatus, LazyIter, List, ListData, Map, MapData};
pub use self::core::{Result, StoreConfig, StoreError};
pub use persist::{ErrorSink, Format, SaveStats};
pub use store::{ReadGuard, Store, WriteGuard, try_with_read, try_with_write, with_read, with_write};
