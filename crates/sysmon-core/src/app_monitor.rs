use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMonitorConfig {
    #[serde(default)]
    pub applications: Vec<MonitoredApplication>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredApplication {
    pub id: String,
    pub name: String,
    pub executable_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub check_interval_seconds: u32,
    #[serde(default)]
    pub restart_delay_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log_source: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl AppMonitorConfig {
    pub fn find_by_executable(&self, path: &str) -> Option<&MonitoredApplication> {
        let wanted = path.trim().to_lowercase();
        self.applications
            .iter()
            .find(|app| app.executable_path.trim().to_lowercase() == wanted)
    }
}
