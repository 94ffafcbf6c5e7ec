//! Lazy, cancelable iteration over a collection snapshot.
//!
//! A producer walks the snapshot and hands elements to the consumer one at
//! a time. It takes the next element from the snapshot only after the
//! consumer asks for it, so nothing is produced ahead of demand and at
//! most one requested element is in flight when a cancel arrives. The
//! consumer side is a [`LazyIter`], which is a [`Stream`]; the producer is
//! stopped through the paired [`CancelHandle`] or by dropping the iterator.
//!
//! The producer runs as a task on the current Tokio runtime. Outside a
//! runtime it runs on a dedicated thread instead.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll};
use std::thread;
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const CANCELED: u8 = 2;
const EXHAUSTED: u8 = 3;

/// Lifecycle of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterStatus {
    NotStarted,
    Running,
    Canceled,
    Exhausted,
}

struct IterState {
    status: AtomicU8,
    canceled: Notify,
    /// One permit per element the consumer is waiting for.
    demand: Semaphore,
}

impl IterState {
    fn new() -> Self {
        Self {
            status: AtomicU8::new(NOT_STARTED),
            canceled: Notify::new(),
            demand: Semaphore::new(0),
        }
    }

    fn status(&self) -> IterStatus {
        match self.status.load(Ordering::Acquire) {
            NOT_STARTED => IterStatus::NotStarted,
            RUNNING => IterStatus::Running,
            CANCELED => IterStatus::Canceled,
            _ => IterStatus::Exhausted,
        }
    }

    fn is_canceled(&self) -> bool {
        self.status.load(Ordering::Acquire) == CANCELED
    }

    /// Returns false if the iteration was canceled before the producer ran.
    fn start(&self) -> bool {
        self.status
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish(&self) {
        let _ = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| match s {
                NOT_STARTED | RUNNING => Some(EXHAUSTED),
                _ => None,
            });
    }

    fn cancel(&self) {
        let changed = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| match s {
                NOT_STARTED | RUNNING => Some(CANCELED),
                _ => None,
            })
            .is_ok();
        if changed {
            self.canceled.notify_waiters();
        }
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.canceled.notified();
            tokio::pin!(notified);
            // Register before checking, so a cancel between the check and
            // the await is not missed.
            notified.as_mut().enable();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

/// Stops a running iteration.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<IterState>,
}

impl CancelHandle {
    /// Stops the iteration. No further elements are delivered.
    ///
    /// Never blocks. Calling it again, or after the iterator was exhausted,
    /// does nothing.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn status(&self) -> IterStatus {
        self.state.status()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").field("status", &self.status()).finish()
    }
}

enum Producer {
    Task(JoinHandle<()>),
    Thread(thread::JoinHandle<()>),
    Unavailable,
}

impl Producer {
    fn is_finished(&self) -> bool {
        match self {
            Producer::Task(handle) => handle.is_finished(),
            Producer::Thread(handle) => handle.is_finished(),
            Producer::Unavailable => true,
        }
    }
}

/// Single-pass stream of elements produced in the background.
pub struct LazyIter<T> {
    rx: mpsc::Receiver<T>,
    state: Arc<IterState>,
    producer: Producer,
    /// Whether a demand permit is outstanding for the next element.
    requested: bool,
}

impl<T> LazyIter<T> {
    /// Next element, or `None` once exhausted or canceled.
    pub async fn next(&mut self) -> Option<T> {
        std::future::poll_fn(|cx| self.poll_item(cx)).await
    }

    pub fn status(&self) -> IterStatus {
        self.state.status()
    }

    /// Returns true once the producer has released its resources.
    pub fn producer_finished(&self) -> bool {
        self.producer.is_finished()
    }

    fn poll_item(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.state.is_canceled() {
            self.rx.close();
            return Poll::Ready(None);
        }

        if !self.requested {
            self.state.demand.add_permits(1);
            self.requested = true;
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => {
                self.requested = false;
                // A cancel that raced with the handoff wins.
                if self.state.is_canceled() {
                    self.rx.close();
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(item))
                }
            }
            Poll::Ready(None) => {
                self.state.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Stream for LazyIter<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().poll_item(cx)
    }
}

impl<T> Drop for LazyIter<T> {
    fn drop(&mut self) {
        self.state.cancel();
    }
}

/// Starts a producer over `items`.
pub(crate) fn spawn<I>(items: I) -> (LazyIter<I::Item>, CancelHandle)
where
    I: IntoIterator + Send + 'static,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let state = Arc::new(IterState::new());
    let job = produce(items, tx, Arc::clone(&state));

    let producer = match Handle::try_current() {
        Ok(runtime) => Producer::Task(runtime.spawn(job)),
        Err(_) => {
            debug!("no Tokio runtime, producing on a dedicated thread");
            let spawned = thread::Builder::new()
                .name("memostore-iter".to_string())
                .spawn(move || futures::executor::block_on(job));
            match spawned {
                Ok(handle) => Producer::Thread(handle),
                // The job and its sender are dropped, so the iterator
                // reports exhaustion right away.
                Err(err) => {
                    warn!(error = %err, "failed to start iterator thread");
                    Producer::Unavailable
                }
            }
        }
    };

    (
        LazyIter {
            rx,
            state: Arc::clone(&state),
            producer,
            requested: false,
        },
        CancelHandle { state },
    )
}

async fn produce<I>(items: I, tx: mpsc::Sender<I::Item>, state: Arc<IterState>)
where
    I: IntoIterator,
{
    if !state.start() {
        return;
    }

    let mut items = items.into_iter();
    loop {
        tokio::select! {
            biased;
            _ = state.cancelled() => return,
            permit = state.demand.acquire() => match permit {
                Ok(permit) => permit.forget(),
                Err(_) => return,
            },
        }

        // The consumer is waiting, so the slot is free.
        let Some(item) = items.next() else { return };
        if tx.send(item).await.is_err() {
            return;
        }
    }
}
