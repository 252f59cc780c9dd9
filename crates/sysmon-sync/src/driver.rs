use crate::cache::{PendingFetch, PollingCache, QueryKey, ResolveOutcome};
use sysmon_core::FetchError;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct FetchCompletion<T> {
    pub key: QueryKey,
    pub request_id: u64,
    pub result: Result<T, FetchError>,
}

impl<T> FetchCompletion<T> {
    pub fn apply(self, cache: &mut PollingCache<T>) -> ResolveOutcome {
        cache.resolve(&self.key, self.request_id, self.result)
    }
}

/// Runs fetches on the tokio runtime and funnels their results back to the
/// one task that owns the cache.
pub struct FetchDriver<T> {
    tx: mpsc::UnboundedSender<FetchCompletion<T>>,
}

impl<T> Clone for FetchDriver<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> FetchDriver<T> {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FetchCompletion<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn(&self, pending: PendingFetch<T>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let PendingFetch {
                key,
                request_id,
                future,
                ..
            } = pending;
            let result = future.await;
            // Receiver gone means the UI loop is shutting down.
            let _ = tx.send(FetchCompletion {
                key,
                request_id,
                result,
            });
        });
    }

    pub fn spawn_all(&self, pending: impl IntoIterator<Item = PendingFetch<T>>) {
        for fetch in pending {
            self.spawn(fetch);
        }
    }
}
