//! Snapshot persistence: file format, file I/O, autosave scheduling and
//! reporting of background failures.

pub mod backend;
pub mod format;
pub mod scheduler;
pub mod sink;

pub use format::Format;
pub use scheduler::{SaveScheduler, SaveStats};
pub use sink::ErrorSink;
