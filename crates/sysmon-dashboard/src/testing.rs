use crate::config::Config;
use crate::state::{ActionOutcome, App, Payload};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysmon_core::{
    AppMonitorConfig, Backend, BackendFuture, LogFolderListing, ProcessRecord, ServiceAction,
    ServiceRecord, ServiceStatus,
};
use sysmon_sync::{FetchDriver, ManualClock, MemoryStore, QueryKey};
use tokio::sync::mpsc;

/// In-process backend: every call succeeds immediately.
#[derive(Default)]
pub struct ScriptedBackend {
    service_lists: AtomicUsize,
}

impl ScriptedBackend {
    pub fn service_lists(&self) -> usize {
        self.service_lists.load(Ordering::SeqCst)
    }
}

impl Backend for ScriptedBackend {
    fn list_logs(&self, _subfolder: Option<String>) -> BackendFuture<LogFolderListing> {
        Box::pin(async { Ok(LogFolderListing::default()) })
    }

    fn read_log(&self, _file_name: String, _subfolder: Option<String>) -> BackendFuture<String> {
        Box::pin(async { Ok(String::new()) })
    }

    fn list_services(&self, _status: Option<ServiceStatus>) -> BackendFuture<Vec<ServiceRecord>> {
        self.service_lists.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(Vec::new()) })
    }

    fn control_service(&self, _service_name: String, _action: ServiceAction) -> BackendFuture<()> {
        Box::pin(async { Ok(()) })
    }

    fn list_processes(&self) -> BackendFuture<Vec<ProcessRecord>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn terminate_process(&self, _pid: u32) -> BackendFuture<()> {
        Box::pin(async { Ok(()) })
    }

    fn app_monitor_config(&self) -> BackendFuture<AppMonitorConfig> {
        Box::pin(async { Ok(AppMonitorConfig::default()) })
    }

    fn save_app_monitor_config(&self, _config: AppMonitorConfig) -> BackendFuture<()> {
        Box::pin(async { Ok(()) })
    }
}

pub struct Harness {
    pub app: App,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemoryStore>,
    pub actions: mpsc::UnboundedReceiver<ActionOutcome>,
}

/// Must be called inside a tokio runtime; the app spawns its fetches.
pub fn harness() -> Harness {
    let config = Config {
        api_url: "http://localhost:5000/api/".to_string(),
        token: None,
        state_dir: std::env::temp_dir(),
        debug: false,
        logs_interval: Duration::from_secs(10),
        services_interval: Duration::from_secs(5),
        processes_interval: Duration::from_secs(3),
    };
    let backend = Arc::new(ScriptedBackend::default());
    let store = Arc::new(MemoryStore::new());
    let (driver, _completions) = FetchDriver::channel();
    let (action_tx, actions) = mpsc::unbounded_channel();
    let app = App::new(
        config,
        backend.clone(),
        store.clone(),
        Arc::new(ManualClock::new()),
        driver,
        action_tx,
    );
    Harness {
        app,
        backend,
        store,
        actions,
    }
}

pub fn press(app: &mut App, code: KeyCode) {
    app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

pub fn seed(app: &mut App, key: &QueryKey, payload: Payload) {
    let request_id = app.cache.entry(key).expect("subscribed").last_request_id;
    app.cache.resolve(key, request_id, Ok(payload));
}

pub fn service(name: &str) -> ServiceRecord {
    ServiceRecord {
        service_name: name.to_string(),
        display_name: name.to_string(),
        status: ServiceStatus::Running,
        service_type: String::new(),
        can_stop: true,
        can_pause_and_continue: false,
    }
}
