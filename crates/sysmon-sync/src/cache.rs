use crate::clock::Clock;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use sysmon_core::FetchError;
use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;

/// Identity of one cached collection. Every parameter that should isolate a
/// fetch has to be folded into the key with [`QueryKey::with_param`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self(resource.into())
    }

    pub fn with_param(mut self, name: &str, value: Option<&str>) -> Self {
        let Some(value) = value else {
            return self;
        };
        let separator = if self.0.contains('?') { '&' } else { '?' };
        self.0.push(separator);
        self.0.push_str(name);
        self.0.push('=');
        self.0.extend(byte_serialize(value.as_bytes()));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key without its parameters, e.g. `services` for every status filter.
    pub fn resource(&self) -> &str {
        match self.0.split_once('?') {
            Some((resource, _)) => resource,
            None => &self.0,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type FetchFuture<T> = BoxFuture<'static, Result<T, FetchError>>;
pub type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Subscribe,
    Interval,
    Invalidate,
    Focus,
}

pub struct PendingFetch<T> {
    pub key: QueryKey,
    pub request_id: u64,
    pub reason: FetchReason,
    pub future: FetchFuture<T>,
}

impl<T> fmt::Debug for PendingFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("key", &self.key)
            .field("request_id", &self.request_id)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: Option<T>,
    pub last_request_id: u64,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub updated_at: Option<Duration>,
}

impl<T> CacheEntry<T> {
    fn empty() -> Self {
        Self {
            data: None,
            last_request_id: 0,
            loading: false,
            error: None,
            updated_at: None,
        }
    }

    /// Holding data from an earlier fetch while the latest one failed.
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Applied,
    Superseded,
    Orphaned,
}

struct Subscription<T> {
    fetch: FetchFn<T>,
    interval: Duration,
    next_due: Duration,
    refetch_on_focus: bool,
    subscribers: usize,
}

/// Keyed, interval-driven fetch-and-cache.
///
/// The cache never runs futures. Every operation that wants network I/O hands
/// back [`PendingFetch`] values; whoever drives them reports results through
/// [`PollingCache::resolve`]. Only the most recently issued request for a key
/// may land in that key's entry.
pub struct PollingCache<T> {
    clock: Arc<dyn Clock>,
    entries: HashMap<QueryKey, CacheEntry<T>>,
    subscriptions: HashMap<QueryKey, Subscription<T>>,
    next_request_id: u64,
}

impl<T> PollingCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: HashMap::new(),
            subscriptions: HashMap::new(),
            next_request_id: 0,
        }
    }

    pub fn subscribe(
        &mut self,
        key: QueryKey,
        fetch: FetchFn<T>,
        interval: Duration,
    ) -> Option<PendingFetch<T>> {
        self.subscribe_with(key, fetch, interval, false)
    }

    pub fn subscribe_on_focus(
        &mut self,
        key: QueryKey,
        fetch: FetchFn<T>,
        interval: Duration,
    ) -> Option<PendingFetch<T>> {
        self.subscribe_with(key, fetch, interval, true)
    }

    fn subscribe_with(
        &mut self,
        key: QueryKey,
        fetch: FetchFn<T>,
        interval: Duration,
        refetch_on_focus: bool,
    ) -> Option<PendingFetch<T>> {
        if let Some(existing) = self.subscriptions.get_mut(&key) {
            existing.subscribers += 1;
            existing.refetch_on_focus |= refetch_on_focus;
            return None;
        }

        let now = self.clock.now();
        self.subscriptions.insert(
            key.clone(),
            Subscription {
                fetch,
                interval,
                next_due: now + interval,
                refetch_on_focus,
                subscribers: 1,
            },
        );
        self.entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty);
        debug!(event = "cache_subscribe", key = %key, interval_ms = interval.as_millis() as u64);
        self.issue(&key, FetchReason::Subscribe)
    }

    /// Drops one subscriber. Returns true when that was the last one and the
    /// entry was evicted.
    pub fn unsubscribe(&mut self, key: &QueryKey) -> bool {
        let Some(subscription) = self.subscriptions.get_mut(key) else {
            return false;
        };
        subscription.subscribers = subscription.subscribers.saturating_sub(1);
        if subscription.subscribers > 0 {
            return false;
        }
        self.subscriptions.remove(key);
        self.entries.remove(key);
        debug!(event = "cache_evict", key = %key);
        true
    }

    pub fn is_subscribed(&self, key: &QueryKey) -> bool {
        self.subscriptions.contains_key(key)
    }

    pub fn entry(&self, key: &QueryKey) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn data(&self, key: &QueryKey) -> Option<&T> {
        self.entries.get(key).and_then(|entry| entry.data.as_ref())
    }

    pub fn subscribed_keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.subscriptions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Issues a fetch for every subscription whose interval has elapsed.
    pub fn poll_due(&mut self) -> Vec<PendingFetch<T>> {
        let now = self.clock.now();
        let mut due: Vec<QueryKey> = self
            .subscriptions
            .iter()
            .filter(|(_, subscription)| subscription.next_due <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.sort();

        let mut fetches = Vec::with_capacity(due.len());
        for key in due {
            if let Some(subscription) = self.subscriptions.get_mut(&key) {
                subscription.next_due = now + subscription.interval;
            }
            fetches.extend(self.issue(&key, FetchReason::Interval));
        }
        fetches
    }

    /// Out-of-cycle fetch; the key's timer restarts as if its interval had just
    /// elapsed. Unsubscribed keys are ignored.
    pub fn invalidate(&mut self, key: &QueryKey) -> Option<PendingFetch<T>> {
        let now = self.clock.now();
        let subscription = self.subscriptions.get_mut(key)?;
        subscription.next_due = now + subscription.interval;
        self.issue(key, FetchReason::Invalidate)
    }

    pub fn revalidate_on_focus(&mut self) -> Vec<PendingFetch<T>> {
        let now = self.clock.now();
        let mut keys: Vec<QueryKey> = self
            .subscriptions
            .iter()
            .filter(|(_, subscription)| subscription.refetch_on_focus)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();

        let mut fetches = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(subscription) = self.subscriptions.get_mut(&key) {
                subscription.next_due = now + subscription.interval;
            }
            fetches.extend(self.issue(&key, FetchReason::Focus));
        }
        fetches
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.subscriptions
            .values()
            .map(|subscription| subscription.next_due)
            .min()
    }

    pub fn resolve(
        &mut self,
        key: &QueryKey,
        request_id: u64,
        result: Result<T, FetchError>,
    ) -> ResolveOutcome {
        if !self.subscriptions.contains_key(key) {
            debug!(event = "cache_resolve_orphaned", key = %key, request_id);
            return ResolveOutcome::Orphaned;
        }
        let Some(entry) = self.entries.get_mut(key) else {
            return ResolveOutcome::Orphaned;
        };
        if request_id != entry.last_request_id {
            debug!(
                event = "cache_resolve_superseded",
                key = %key,
                request_id,
                latest = entry.last_request_id
            );
            return ResolveOutcome::Superseded;
        }

        entry.loading = false;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.updated_at = Some(self.clock.now());
            }
            Err(err) => {
                warn!(event = "fetch_failed", key = %key, request_id, error = %err);
                entry.error = Some(err);
            }
        }
        ResolveOutcome::Applied
    }

    fn issue(&mut self, key: &QueryKey, reason: FetchReason) -> Option<PendingFetch<T>> {
        let subscription = self.subscriptions.get(key)?;
        let future = (subscription.fetch)();
        // Ids are cache-wide so a re-created entry never accepts a response
        // issued for its evicted predecessor.
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty);
        entry.last_request_id = request_id;
        entry.loading = true;
        Some(PendingFetch {
            key: key.clone(),
            request_id,
            reason,
            future,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetch(calls: Arc<AtomicUsize>) -> FetchFn<&'static str> {
        Arc::new(move || -> FetchFuture<&'static str> {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok("fresh") })
        })
    }

    fn cache_with_clock() -> (PollingCache<&'static str>, ManualClock) {
        let clock = ManualClock::new();
        (PollingCache::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn param_values_cannot_forge_other_params() {
        let forged = QueryKey::new("logs/content")
            .with_param("subfolder", Some("a&file=b.log"))
            .with_param("file", Some("c"));
        let plain = QueryKey::new("logs/content")
            .with_param("subfolder", Some("a"))
            .with_param("file", Some("b.log&file=c"));

        assert_ne!(forged, plain);
        assert_eq!(
            forged.as_str(),
            "logs/content?subfolder=a%26file%3Db.log&file=c"
        );
        assert_eq!(forged.resource(), "logs/content");
        assert_eq!(QueryKey::new("processes").resource(), "processes");
    }

    #[test]
    fn subscribe_fetches_immediately_and_marks_loading() {
        let (mut cache, _clock) = cache_with_clock();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("processes");

        let pending = cache
            .subscribe(key.clone(), counting_fetch(calls.clone()), Duration::from_secs(3))
            .expect("initial fetch");

        assert_eq!(pending.reason, FetchReason::Subscribe);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let entry = cache.entry(&key).expect("entry");
        assert!(entry.loading);
        assert_eq!(entry.data, None);
        assert_eq!(entry.last_request_id, pending.request_id);
    }

    #[test]
    fn second_subscriber_shares_the_entry() {
        let (mut cache, _clock) = cache_with_clock();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("services");

        assert!(cache
            .subscribe(key.clone(), counting_fetch(calls.clone()), Duration::from_secs(5))
            .is_some());
        assert!(cache
            .subscribe(key.clone(), counting_fetch(calls.clone()), Duration::from_secs(5))
            .is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(!cache.unsubscribe(&key));
        assert!(cache.is_subscribed(&key));
        assert!(cache.unsubscribe(&key));
        assert!(cache.entry(&key).is_none());
    }

    #[test]
    fn interval_ticks_issue_fetches_only_when_due() {
        let (mut cache, clock) = cache_with_clock();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("services");
        let _ = cache.subscribe(key.clone(), counting_fetch(calls.clone()), Duration::from_secs(5));

        clock.advance(Duration::from_millis(4999));
        assert!(cache.poll_due().is_empty());

        clock.advance(Duration::from_millis(1));
        let due = cache.poll_due();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].reason, FetchReason::Interval);
        assert!(cache.poll_due().is_empty());
        assert_eq!(cache.next_deadline(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn out_of_order_responses_keep_the_latest() {
        let (mut cache, _clock) = cache_with_clock();
        let key = QueryKey::new("logs");
        let first = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(10))
            .expect("first");
        let second = cache.invalidate(&key).expect("second");

        assert_eq!(
            cache.resolve(&key, second.request_id, Ok("second")),
            ResolveOutcome::Applied
        );
        assert_eq!(
            cache.resolve(&key, first.request_id, Ok("first")),
            ResolveOutcome::Superseded
        );
        assert_eq!(cache.data(&key), Some(&"second"));
        assert!(!cache.entry(&key).expect("entry").loading);
    }

    #[test]
    fn earlier_response_does_not_clear_loading_of_latest() {
        let (mut cache, _clock) = cache_with_clock();
        let key = QueryKey::new("logs");
        let first = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(10))
            .expect("first");
        let _second = cache.invalidate(&key).expect("second");

        cache.resolve(&key, first.request_id, Ok("first"));
        let entry = cache.entry(&key).expect("entry");
        assert!(entry.loading);
        assert_eq!(entry.data, None);
    }

    #[test]
    fn failure_keeps_previous_data() {
        let (mut cache, _clock) = cache_with_clock();
        let key = QueryKey::new("services");
        let first = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(5))
            .expect("first");
        cache.resolve(&key, first.request_id, Ok("good"));

        let retry = cache.invalidate(&key).expect("retry");
        let outcome = cache.resolve(
            &key,
            retry.request_id,
            Err(FetchError::Status {
                status: 503,
                message: "unavailable".to_string(),
            }),
        );

        assert_eq!(outcome, ResolveOutcome::Applied);
        let entry = cache.entry(&key).expect("entry");
        assert_eq!(entry.data, Some("good"));
        assert!(entry.is_stale());
        assert_eq!(entry.error.as_ref().and_then(FetchError::status), Some(503));
    }

    #[test]
    fn success_after_failure_clears_error() {
        let (mut cache, _clock) = cache_with_clock();
        let key = QueryKey::new("services");
        let first = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(5))
            .expect("first");
        cache.resolve(&key, first.request_id, Err(FetchError::Transport("down".into())));
        let second = cache.invalidate(&key).expect("second");
        cache.resolve(&key, second.request_id, Ok("back"));

        let entry = cache.entry(&key).expect("entry");
        assert_eq!(entry.error, None);
        assert_eq!(entry.data, Some("back"));
    }

    #[test]
    fn responses_for_evicted_keys_are_orphaned() {
        let (mut cache, _clock) = cache_with_clock();
        let key = QueryKey::new("logs").with_param("file", Some("a.log"));
        let pending = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(2))
            .expect("fetch");
        cache.unsubscribe(&key);

        assert_eq!(
            cache.resolve(&key, pending.request_id, Ok("late")),
            ResolveOutcome::Orphaned
        );
        assert!(cache.entry(&key).is_none());
    }

    #[test]
    fn resubscribed_key_rejects_predecessor_response() {
        let (mut cache, _clock) = cache_with_clock();
        let key = QueryKey::new("logs");
        let old = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(2))
            .expect("old");
        cache.unsubscribe(&key);
        let new = cache
            .subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(2))
            .expect("new");

        assert!(new.request_id > old.request_id);
        assert_eq!(
            cache.resolve(&key, old.request_id, Ok("old")),
            ResolveOutcome::Superseded
        );
        assert_eq!(cache.data(&key), None);
    }

    #[test]
    fn invalidate_restarts_the_timer() {
        let (mut cache, clock) = cache_with_clock();
        let key = QueryKey::new("services");
        let _ = cache.subscribe(key.clone(), counting_fetch(Arc::default()), Duration::from_secs(5));

        clock.advance(Duration::from_secs(4));
        assert_eq!(
            cache.invalidate(&key).map(|pending| pending.reason),
            Some(FetchReason::Invalidate)
        );
        clock.advance(Duration::from_secs(1));
        assert!(cache.poll_due().is_empty());
        clock.advance(Duration::from_secs(4));
        assert_eq!(cache.poll_due().len(), 1);
    }

    #[test]
    fn invalidate_ignores_unknown_keys() {
        let (mut cache, _clock) = cache_with_clock();
        assert!(cache.invalidate(&QueryKey::new("nothing")).is_none());
    }

    #[test]
    fn focus_only_refetches_opted_in_keys() {
        let (mut cache, _clock) = cache_with_clock();
        let plain = QueryKey::new("services");
        let tail = QueryKey::new("logs/content").with_param("file", Some("a.log"));
        let _ = cache.subscribe(plain, counting_fetch(Arc::default()), Duration::from_secs(5));
        let _ = cache.subscribe_on_focus(
            tail.clone(),
            counting_fetch(Arc::default()),
            Duration::from_secs(2),
        );

        let fetches = cache.revalidate_on_focus();
        assert_eq!(fetches.len(), 1);
        assert_eq!(fetches[0].key, tail);
        assert_eq!(fetches[0].reason, FetchReason::Focus);
    }

    #[test]
    fn query_key_folds_params_in_order() {
        let key = QueryKey::new("services")
            .with_param("status", Some("Running"))
            .with_param("skipped", None)
            .with_param("page", Some("2"));
        assert_eq!(key.as_str(), "services?status=Running&page=2");
    }
}
