use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/";
pub const DEFAULT_LOGS_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_SERVICES_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PROCESSES_INTERVAL_SECS: u64 = 3;

#[derive(Parser, Debug)]
#[command(name = "sysmon-dashboard")]
pub struct Args {
    #[arg(long, default_value = "")]
    api_url: String,
    #[arg(long, default_value = "")]
    token: String,
    #[arg(long, default_value = "")]
    state_dir: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value_t = DEFAULT_SERVICES_INTERVAL_SECS)]
    services_interval_secs: u64,
    #[arg(long, default_value_t = DEFAULT_PROCESSES_INTERVAL_SECS)]
    processes_interval_secs: u64,
    #[arg(long, default_value_t = DEFAULT_LOGS_INTERVAL_SECS)]
    logs_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub state_dir: PathBuf,
    pub debug: bool,
    pub logs_interval: Duration,
    pub services_interval: Duration,
    pub processes_interval: Duration,
}

impl Config {
    pub fn view_state_path(&self) -> PathBuf {
        self.state_dir.join("view-state.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("sysmon-dashboard.log")
    }
}

pub fn load_config() -> Config {
    from_args(Args::parse())
}

fn from_args(args: Args) -> Config {
    Config {
        api_url: resolve_api_url(&args.api_url),
        token: resolve_token(&args.token),
        state_dir: resolve_state_dir(&args.state_dir),
        debug: args.debug || env_true("SYSMON_DEBUG"),
        logs_interval: interval_secs(args.logs_interval_secs),
        services_interval: interval_secs(args.services_interval_secs),
        processes_interval: interval_secs(args.processes_interval_secs),
    }
}

fn interval_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_api_url(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    non_empty_env("SYSMON_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

fn resolve_token(flag: &str) -> Option<String> {
    if !flag.trim().is_empty() {
        return Some(flag.trim().to_string());
    }
    non_empty_env("SYSMON_TOKEN")
}

fn resolve_state_dir(flag: &str) -> PathBuf {
    if !flag.trim().is_empty() {
        return PathBuf::from(flag.trim());
    }
    if let Some(value) = non_empty_env("SYSMON_STATE_DIR") {
        return PathBuf::from(value);
    }
    if let Some(value) = non_empty_env("XDG_STATE_HOME") {
        return PathBuf::from(value).join("sysmon");
    }
    if let Some(value) = non_empty_env("HOME") {
        return PathBuf::from(value)
            .join(".local")
            .join("state")
            .join("sysmon");
    }
    PathBuf::from(".sysmon/state")
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}
