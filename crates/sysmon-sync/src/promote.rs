use crate::error::{ActionError, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use sysmon_core::{AppMonitorConfig, Backend, MonitoredApplication, ProcessRecord};
use tracing::info;

pub const DEFAULT_CHECK_INTERVAL_SECONDS: u32 = 30;
pub const DEFAULT_RESTART_DELAY_SECONDS: u32 = 10;

/// Checks that can run before touching the backend.
pub fn validate_candidate(process: &ProcessRecord) -> Result<&str, ValidationError> {
    process
        .executable_path()
        .ok_or_else(|| ValidationError::MissingExecutablePath {
            process: format!("{} ({})", process.name, process.id),
        })
}

/// Appends a monitored entry for `process` unless its executable is already
/// present. The caller supplies the id.
pub fn append_application(
    config: &mut AppMonitorConfig,
    process: &ProcessRecord,
    id: String,
) -> Result<MonitoredApplication, ValidationError> {
    let path = validate_candidate(process)?;
    if config.find_by_executable(path).is_some() {
        return Err(ValidationError::DuplicateApplication {
            path: path.to_string(),
        });
    }

    let application = MonitoredApplication {
        id,
        name: process.name.clone(),
        executable_path: path.to_string(),
        arguments: None,
        working_directory: None,
        enabled: true,
        check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
        restart_delay_seconds: DEFAULT_RESTART_DELAY_SECONDS,
        log_path: None,
        event_log_source: None,
        extra: HashMap::new(),
    };
    config.applications.push(application.clone());
    Ok(application)
}

/// Read-modify-write of the application monitor config. Concurrent writers
/// are not detected; the last PUT wins.
pub async fn promote_process(
    backend: Arc<dyn Backend>,
    process: ProcessRecord,
) -> Result<MonitoredApplication, ActionError> {
    validate_candidate(&process)?;

    let mut config = backend.app_monitor_config().await?;
    let application = append_application(&mut config, &process, uuid::Uuid::new_v4().to_string())?;
    backend.save_app_monitor_config(config).await?;

    info!(
        event = "process_promoted",
        pid = process.id,
        application_id = %application.id,
        path = %application.executable_path
    );
    Ok(application)
}
