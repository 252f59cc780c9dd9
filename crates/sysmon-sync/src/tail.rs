use crate::cache::{FetchFn, PendingFetch, PollingCache, QueryKey};
use std::time::Duration;
use sysmon_core::FetchError;
use tracing::debug;

pub const TAIL_INTERVAL: Duration = Duration::from_secs(2);

pub fn content_key(folder: Option<&str>, file: &str) -> QueryKey {
    QueryKey::new("logs/content")
        .with_param("subfolder", folder)
        .with_param("file", Some(file))
}

#[derive(Debug)]
pub struct TailContent<'a, T> {
    pub data: Option<&'a T>,
    pub error: Option<&'a FetchError>,
    pub loading: bool,
}

/// Polls the full content of one selected log file.
///
/// At most one content key is subscribed at a time. Switching file or folder
/// drops the previous subscription before anything new is issued, so late
/// responses for the old file resolve as orphaned.
#[derive(Debug, Default)]
pub struct LogTailer {
    folder: Option<String>,
    file: Option<String>,
    key: Option<QueryKey>,
}

impl LogTailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn key(&self) -> Option<&QueryKey> {
        self.key.as_ref()
    }

    /// A file name is only meaningful inside its folder, so the selection is
    /// always cleared here, even when the folder does not change.
    pub fn select_folder<T>(&mut self, folder: Option<String>, cache: &mut PollingCache<T>) {
        self.clear(cache);
        self.folder = folder.filter(|folder| !folder.is_empty());
    }

    pub fn select_file<T, F>(
        &mut self,
        file: Option<String>,
        cache: &mut PollingCache<T>,
        make_fetch: F,
    ) -> Option<PendingFetch<T>>
    where
        F: FnOnce(Option<String>, String) -> FetchFn<T>,
    {
        if file.is_some() && file == self.file {
            return None;
        }
        self.clear(cache);
        let file = file?;

        let key = content_key(self.folder.as_deref(), &file);
        debug!(event = "tail_start", key = %key);
        let fetch = make_fetch(self.folder.clone(), file.clone());
        self.file = Some(file);
        self.key = Some(key.clone());
        cache.subscribe_on_focus(key, fetch, TAIL_INTERVAL)
    }

    pub fn clear<T>(&mut self, cache: &mut PollingCache<T>) {
        if let Some(key) = self.key.take() {
            debug!(event = "tail_stop", key = %key);
            cache.unsubscribe(&key);
        }
        self.file = None;
    }

    pub fn content<'a, T>(&self, cache: &'a PollingCache<T>) -> Option<TailContent<'a, T>> {
        let entry = cache.entry(self.key.as_ref()?)?;
        Some(TailContent {
            data: entry.data.as_ref(),
            error: entry.error.as_ref(),
            loading: entry.loading,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FetchFuture, ResolveOutcome};
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn text_fetch(folder: Option<String>, file: String) -> FetchFn<String> {
        Arc::new(move || -> FetchFuture<String> {
            let body = format!("{}/{file}", folder.clone().unwrap_or_default());
            Box::pin(async move { Ok(body) })
        })
    }

    fn cache() -> (PollingCache<String>, ManualClock) {
        let clock = ManualClock::new();
        (PollingCache::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn key_folds_folder_and_file() {
        assert_eq!(content_key(None, "app.log").as_str(), "logs/content?file=app.log");
        assert_eq!(
            content_key(Some("2024"), "app.log").as_str(),
            "logs/content?subfolder=2024&file=app.log"
        );
    }

    #[test]
    fn switching_files_orphans_the_previous_poll() {
        let (mut cache, _clock) = cache();
        let mut tailer = LogTailer::new();

        let a = tailer
            .select_file(Some("a.log".into()), &mut cache, text_fetch)
            .expect("fetch a");
        let b = tailer
            .select_file(Some("b.log".into()), &mut cache, text_fetch)
            .expect("fetch b");

        assert_eq!(cache.resolve(&a.key, a.request_id, Ok("A".into())), ResolveOutcome::Orphaned);
        assert_eq!(cache.resolve(&b.key, b.request_id, Ok("B".into())), ResolveOutcome::Applied);
        assert_eq!(cache.subscribed_keys(), vec![b.key.clone()]);
        let content = tailer.content(&cache).expect("content");
        assert_eq!(content.data.map(String::as_str), Some("B"));
    }

    #[test]
    fn reselecting_the_same_file_keeps_polling() {
        let (mut cache, _clock) = cache();
        let mut tailer = LogTailer::new();
        assert!(tailer
            .select_file(Some("a.log".into()), &mut cache, text_fetch)
            .is_some());
        assert!(tailer
            .select_file(Some("a.log".into()), &mut cache, text_fetch)
            .is_none());
        assert_eq!(cache.subscribed_keys().len(), 1);
    }

    #[test]
    fn folder_change_clears_the_selection() {
        let (mut cache, _clock) = cache();
        let mut tailer = LogTailer::new();
        let _ = tailer.select_file(Some("a.log".into()), &mut cache, text_fetch);

        tailer.select_folder(Some("archive".into()), &mut cache);
        assert_eq!(tailer.file(), None);
        assert_eq!(tailer.folder(), Some("archive"));
        assert!(cache.subscribed_keys().is_empty());
        assert!(tailer.content(&cache).is_none());

        tailer.select_folder(Some("archive".into()), &mut cache);
        assert_eq!(tailer.file(), None);
    }

    #[test]
    fn clearing_the_file_stops_polling() {
        let (mut cache, clock) = cache();
        let mut tailer = LogTailer::new();
        let _ = tailer.select_file(Some("a.log".into()), &mut cache, text_fetch);
        assert!(tailer.select_file(None, &mut cache, text_fetch).is_none());

        clock.advance(TAIL_INTERVAL * 3);
        assert!(cache.poll_due().is_empty());
    }

    #[test]
    fn tail_polls_on_its_interval_and_on_focus() {
        let (mut cache, clock) = cache();
        let mut tailer = LogTailer::new();
        let _ = tailer.select_file(Some("a.log".into()), &mut cache, text_fetch);

        clock.advance(TAIL_INTERVAL);
        assert_eq!(cache.poll_due().len(), 1);
        assert_eq!(cache.revalidate_on_focus().len(), 1);
    }
}
