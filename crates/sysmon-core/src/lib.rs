pub mod app_monitor;
pub mod contract;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use app_monitor::{AppMonitorConfig, MonitoredApplication};
pub use contract::{Backend, BackendFuture, FetchError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileEntry {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFolderListing {
    #[serde(default, rename = "folder", alias = "currentFolder")]
    pub current_folder: String,
    #[serde(default)]
    pub subfolders: Vec<String>,
    #[serde(default)]
    pub files: Vec<LogFileEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Paused,
    StartPending,
    StopPending,
    ContinuePending,
    PausePending,
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Running => "Running",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Paused => "Paused",
            ServiceStatus::StartPending => "StartPending",
            ServiceStatus::StopPending => "StopPending",
            ServiceStatus::ContinuePending => "ContinuePending",
            ServiceStatus::PausePending => "PausePending",
            ServiceStatus::Unknown => "Unknown",
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ServiceStatus::StartPending
                | ServiceStatus::StopPending
                | ServiceStatus::ContinuePending
                | ServiceStatus::PausePending
        )
    }

    // Numeric codes follow the Windows service controller enumeration.
    fn from_code(code: u64) -> Self {
        match code {
            1 => ServiceStatus::Stopped,
            2 => ServiceStatus::StartPending,
            3 => ServiceStatus::StopPending,
            4 => ServiceStatus::Running,
            5 => ServiceStatus::ContinuePending,
            6 => ServiceStatus::PausePending,
            7 => ServiceStatus::Paused,
            _ => ServiceStatus::Unknown,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized: String = input
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "running" => Ok(ServiceStatus::Running),
            "stopped" => Ok(ServiceStatus::Stopped),
            "paused" => Ok(ServiceStatus::Paused),
            "startpending" => Ok(ServiceStatus::StartPending),
            "stoppending" => Ok(ServiceStatus::StopPending),
            "continuepending" => Ok(ServiceStatus::ContinuePending),
            "pausepending" => Ok(ServiceStatus::PausePending),
            "unknown" => Ok(ServiceStatus::Unknown),
            _ => Err(format!("Unknown service status: {input}")),
        }
    }
}

impl Serialize for ServiceStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = Value::deserialize(deserializer)?;
        Ok(match val {
            Value::String(s) => s.parse().unwrap_or(ServiceStatus::Unknown),
            Value::Number(n) => n
                .as_u64()
                .map(ServiceStatus::from_code)
                .unwrap_or(ServiceStatus::Unknown),
            _ => ServiceStatus::Unknown,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatusFilter {
    #[default]
    All,
    Only(ServiceStatus),
}

impl ServiceStatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            ServiceStatusFilter::All => "all",
            ServiceStatusFilter::Only(status) => status.as_str(),
        }
    }

    pub fn query_value(self) -> Option<ServiceStatus> {
        match self {
            ServiceStatusFilter::All => None,
            ServiceStatusFilter::Only(status) => Some(status),
        }
    }

    pub fn next(self) -> Self {
        match self {
            ServiceStatusFilter::All => ServiceStatusFilter::Only(ServiceStatus::Running),
            ServiceStatusFilter::Only(ServiceStatus::Running) => {
                ServiceStatusFilter::Only(ServiceStatus::Stopped)
            }
            ServiceStatusFilter::Only(ServiceStatus::Stopped) => {
                ServiceStatusFilter::Only(ServiceStatus::Paused)
            }
            ServiceStatusFilter::Only(_) => ServiceStatusFilter::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub service_name: String,
    #[serde(default)]
    pub display_name: String,
    pub status: ServiceStatus,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub service_type: String,
    #[serde(default)]
    pub can_stop: bool,
    #[serde(default)]
    pub can_pause_and_continue: bool,
}

impl ServiceRecord {
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.service_name
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            ServiceAction::Start => "started",
            ServiceAction::Stop => "stopped",
            ServiceAction::Restart => "restarted",
        }
    }

    /// Stopping and restarting both interrupt a running service.
    pub fn is_destructive(self) -> bool {
        matches!(self, ServiceAction::Stop | ServiceAction::Restart)
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub working_set_bytes: u64,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default = "default_responding")]
    pub responding: bool,
    #[serde(default)]
    pub executable_path: Option<String>,
}

impl ProcessRecord {
    pub fn executable_path(&self) -> Option<&str> {
        self.executable_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }
}

fn default_responding() -> bool {
    true
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Accepts RFC 3339 timestamps and offset-less ISO-8601 timestamps (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(raw) if !raw.trim().is_empty() => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
        _ => Ok(None),
    }
}

/// Service types arrive either as a name or as a numeric flag set.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(serde::de::Error::custom("expected string or number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_decodes_wire_shape() {
        let listing: LogFolderListing = serde_json::from_value(json!({
            "folder": "archive/2024",
            "subfolders": ["01", "02"],
            "files": [
                {"name": "access.log", "sizeBytes": 2048, "lastModified": "2024-03-01T10:00:00Z"},
                {"name": "error.log", "sizeBytes": 0, "lastModified": "2024-03-01T10:00:00.123"}
            ]
        }))
        .expect("decode listing");

        assert_eq!(listing.current_folder, "archive/2024");
        assert_eq!(listing.subfolders, vec!["01", "02"]);
        assert_eq!(listing.files[0].size_bytes, 2048);
        assert_eq!(
            listing.files[1].last_modified,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single().expect("ts")
                + chrono::Duration::milliseconds(123)
        );
    }

    #[test]
    fn service_status_accepts_names_codes_and_unknowns() {
        let records: Vec<ServiceRecord> = serde_json::from_value(json!([
            {"serviceName": "a", "displayName": "A", "status": "Running", "serviceType": "Win32OwnProcess", "canStop": true, "canPauseAndContinue": false},
            {"serviceName": "b", "displayName": "", "status": 7, "serviceType": 16},
            {"serviceName": "c", "status": "Hibernating"}
        ]))
        .expect("decode services");

        assert_eq!(records[0].status, ServiceStatus::Running);
        assert_eq!(records[1].status, ServiceStatus::Paused);
        assert_eq!(records[1].service_type, "16");
        assert_eq!(records[1].label(), "b");
        assert_eq!(records[2].status, ServiceStatus::Unknown);
        assert!(!records[2].can_stop);
    }

    #[test]
    fn service_status_parses_loose_spellings() {
        assert_eq!(
            "start_pending".parse::<ServiceStatus>(),
            Ok(ServiceStatus::StartPending)
        );
        assert_eq!("RUNNING".parse::<ServiceStatus>(), Ok(ServiceStatus::Running));
        assert!("nope".parse::<ServiceStatus>().is_err());
    }

    #[test]
    fn status_filter_cycles_back_to_all() {
        let mut filter = ServiceStatusFilter::All;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(filter.label());
            filter = filter.next();
        }
        assert_eq!(seen, vec!["all", "Running", "Stopped", "Paused"]);
        assert_eq!(filter, ServiceStatusFilter::All);
    }

    #[test]
    fn process_handles_missing_optionals() {
        let process: ProcessRecord = serde_json::from_value(json!({
            "id": 4242,
            "name": "svchost",
            "workingSetBytes": 1_048_576,
            "startTime": null,
            "responding": false,
            "executablePath": "   "
        }))
        .expect("decode process");

        assert_eq!(process.start_time, None);
        assert!(!process.responding);
        assert_eq!(process.executable_path(), None);
    }

    #[test]
    fn destructive_actions_are_stop_and_restart() {
        assert!(!ServiceAction::Start.is_destructive());
        assert!(ServiceAction::Stop.is_destructive());
        assert!(ServiceAction::Restart.is_destructive());
        assert_eq!(ServiceAction::Restart.to_string(), "restart");
    }
}
