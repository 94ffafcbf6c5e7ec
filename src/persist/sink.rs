//! Destination for failures of background saves.
//!
//! A save triggered by the scheduler runs after the mutating caller has
//! already returned, so its error has nowhere to propagate. The sink
//! either forwards it to a channel the application drains or writes it to
//! the log.

use crate::core::StoreError;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    tx: Option<mpsc::Sender<StoreError>>,
}

impl ErrorSink {
    /// Sink that only logs failures.
    pub fn log() -> Self {
        Self { tx: None }
    }

    /// Sink backed by a bounded channel.
    ///
    /// The receiver must be drained: when the channel is full, the task
    /// reporting the failure waits for free capacity. Once the receiver is
    /// dropped, failures go to the log instead.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StoreError>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Returns true if failures are forwarded to a live receiver.
    pub fn is_connected(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub async fn report(&self, err: StoreError) {
        let err = match &self.tx {
            Some(tx) => match tx.send(err).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(err)) => err,
            },
            None => err,
        };

        log::error!("background save failed: {}", err);
    }
}
