use crate::{
    AppMonitorConfig, LogFolderListing, ProcessRecord, ServiceAction, ServiceRecord,
    ServiceStatus,
};
use futures_util::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type BackendFuture<T> = BoxFuture<'static, Result<T, FetchError>>;

/// Remote collaborator behind the dashboard. Futures are owned so callers can
/// spawn them onto any executor.
pub trait Backend: Send + Sync {
    fn list_logs(&self, subfolder: Option<String>) -> BackendFuture<LogFolderListing>;

    fn read_log(&self, file_name: String, subfolder: Option<String>) -> BackendFuture<String>;

    fn list_services(&self, status: Option<ServiceStatus>) -> BackendFuture<Vec<ServiceRecord>>;

    fn control_service(&self, service_name: String, action: ServiceAction) -> BackendFuture<()>;

    fn list_processes(&self) -> BackendFuture<Vec<ProcessRecord>>;

    fn terminate_process(&self, pid: u32) -> BackendFuture<()>;

    fn app_monitor_config(&self) -> BackendFuture<AppMonitorConfig>;

    fn save_app_monitor_config(&self, config: AppMonitorConfig) -> BackendFuture<()>;

    /// Link for opening a log outside the polling cycle, when the transport
    /// has one.
    fn download_link(&self, _file_name: &str, _subfolder: Option<&str>) -> Option<String> {
        None
    }
}
