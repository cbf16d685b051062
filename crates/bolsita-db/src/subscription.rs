//! # Live Subscriptions
//!
//! A [`Subscription`] holds the latest decoded snapshot of a collection (or
//! of one document) and refreshes it after every committed change.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  repo.subscribe()                                                       │
//! │       │                                                                 │
//! │       ├── store.changes()  (subscribed BEFORE the first load)          │
//! │       ├── initial load ──► watch::channel(snapshot)                    │
//! │       ▼                                                                 │
//! │  spawned refresher task                                                 │
//! │       loop {                                                            │
//! │         event ──► matches source? ──► reload + decode ──► watch.send   │
//! │       }                                                                 │
//! │                                                                         │
//! │  Subscription ── current() / changed() / into_stream()                 │
//! │       │                                                                 │
//! │       └── drop / unsubscribe() ──► task aborted                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subscribing before the initial load means a write that lands between
//! the two still triggers a refresh.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::store::{DocPath, DocumentStore, StoredDoc};

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Collection(String),
    Document(DocPath),
}

impl Source {
    fn matches(&self, path: &DocPath) -> bool {
        match self {
            Source::Collection(collection) => &path.collection == collection,
            Source::Document(doc) => path == doc,
        }
    }

    async fn load(&self, store: &dyn DocumentStore) -> DbResult<Vec<StoredDoc>> {
        match self {
            Source::Collection(collection) => store.list(collection).await,
            Source::Document(path) => Ok(store.get(path).await?.into_iter().collect()),
        }
    }
}

/// Aborts the refresher when the last handle goes away.
#[derive(Debug)]
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A live, cancellable view of stored data.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    guard: AbortOnDrop,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Loads the initial snapshot and starts refreshing it.
    ///
    /// `decode` turns the raw documents into the snapshot (and orders it).
    pub async fn start<F>(store: Arc<dyn DocumentStore>, source: Source, decode: F) -> DbResult<Self>
    where
        F: Fn(Vec<StoredDoc>) -> DbResult<T> + Send + Sync + 'static,
    {
        let mut changes = store.changes();
        let initial = decode(source.load(store.as_ref()).await?)?;
        let (tx, rx) = watch::channel(initial);

        debug!(source = ?source, "Subscription started");

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) if !source.matches(&event.path) => continue,
                    Ok(_) => {}
                    // Missed events: reload anyway, the snapshot is complete.
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Subscription lagged, reloading");
                    }
                    Err(RecvError::Closed) => break,
                }

                match source.load(store.as_ref()).await.and_then(|docs| decode(docs)) {
                    Ok(snapshot) => {
                        if tx.send(snapshot).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(source = ?source, error = %err, "Subscription refresh failed"),
                }
            }
        });

        Ok(Subscription {
            rx,
            guard: AbortOnDrop(task),
        })
    }

    /// The latest snapshot.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot. `None` once the feed has ended.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stream of snapshots, starting with the current one.
    pub fn into_stream(self) -> SubscriptionStream<T> {
        SubscriptionStream {
            inner: WatchStream::new(self.rx),
            _guard: self.guard,
        }
    }

    /// Stops delivery. Same as dropping.
    pub fn unsubscribe(self) {
        debug!("Subscription cancelled");
    }
}

/// [`Subscription`] as a `Stream`; dropping it cancels the refresher.
pub struct SubscriptionStream<T> {
    inner: WatchStream<T>,
    _guard: AbortOnDrop,
}

impl<T> Stream for SubscriptionStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
