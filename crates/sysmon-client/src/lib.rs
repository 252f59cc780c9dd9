use futures_util::FutureExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use sysmon_core::{
    AppMonitorConfig, Backend, BackendFuture, FetchError, LogFolderListing, ProcessRecord,
    ServiceAction, ServiceRecord, ServiceStatus,
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid api url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("api url {0} cannot carry a path")]
    NotABase(String),
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// The dashboard's backend over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        let mut raw = base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|source| ClientError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::NotABase(raw));
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base,
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn logs_url(&self, subfolder: Option<&str>) -> Url {
        let mut url = self.endpoint(&["logs"]);
        if let Some(subfolder) = subfolder.filter(|s| !s.is_empty()) {
            url.query_pairs_mut().append_pair("subfolder", subfolder);
        }
        url
    }

    /// Also used as the direct-download link, so the token rides along when
    /// one is configured.
    pub fn log_download_url(&self, file_name: &str, subfolder: Option<&str>) -> Url {
        let mut url = self.endpoint(&["logs", file_name]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(subfolder) = subfolder.filter(|s| !s.is_empty()) {
                query.append_pair("subfolder", subfolder);
            }
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }

    pub fn services_url(&self, status: Option<ServiceStatus>) -> Url {
        let mut url = self.endpoint(&["services"]);
        if let Some(status) = status {
            url.query_pairs_mut().append_pair("status", status.as_str());
        }
        url
    }

    pub fn service_action_url(&self, service_name: &str, action: ServiceAction) -> Url {
        self.endpoint(&["services", service_name, action.path_segment()])
    }

    pub fn process_url(&self, pid: Option<u32>) -> Url {
        match pid {
            Some(pid) => self.endpoint(&["processes", &pid.to_string()]),
            None => self.endpoint(&["processes"]),
        }
    }

    pub fn app_monitor_url(&self) -> Url {
        self.endpoint(&["application-monitor", "config"])
    }
}

impl Backend for HttpBackend {
    fn list_logs(&self, subfolder: Option<String>) -> BackendFuture<LogFolderListing> {
        get_json(self.client.get(self.logs_url(subfolder.as_deref()))).boxed()
    }

    fn read_log(&self, file_name: String, subfolder: Option<String>) -> BackendFuture<String> {
        let request = self
            .client
            .get(self.log_download_url(&file_name, subfolder.as_deref()));
        async move { send(request).await?.text().await.map_err(decode_error) }.boxed()
    }

    fn list_services(&self, status: Option<ServiceStatus>) -> BackendFuture<Vec<ServiceRecord>> {
        get_json(self.client.get(self.services_url(status))).boxed()
    }

    fn control_service(&self, service_name: String, action: ServiceAction) -> BackendFuture<()> {
        let request = self
            .client
            .post(self.service_action_url(&service_name, action));
        send_empty(request).boxed()
    }

    fn list_processes(&self) -> BackendFuture<Vec<ProcessRecord>> {
        get_json(self.client.get(self.process_url(None))).boxed()
    }

    fn terminate_process(&self, pid: u32) -> BackendFuture<()> {
        send_empty(self.client.delete(self.process_url(Some(pid)))).boxed()
    }

    fn app_monitor_config(&self) -> BackendFuture<AppMonitorConfig> {
        get_json(self.client.get(self.app_monitor_url())).boxed()
    }

    fn save_app_monitor_config(&self, config: AppMonitorConfig) -> BackendFuture<()> {
        send_empty(self.client.put(self.app_monitor_url()).json(&config)).boxed()
    }

    fn download_link(&self, file_name: &str, subfolder: Option<&str>) -> Option<String> {
        Some(self.log_download_url(file_name, subfolder).to_string())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|err| FetchError::Transport(err.to_string()))?;
    let status = response.status();
    debug!(event = "http_response", url = %response.url(), status = status.as_u16());
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason()),
    })
}

async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    send(request).await?.json::<T>().await.map_err(decode_error)
}

async fn send_empty(request: RequestBuilder) -> Result<(), FetchError> {
    send(request).await.map(|_| ())
}

fn decode_error(err: reqwest::Error) -> FetchError {
    FetchError::Decode(err.to_string())
}

fn error_message(body: &str, reason: Option<&str>) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return reason.unwrap_or("request failed").to_string();
    }
    let mut message: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
    if trimmed.chars().count() > ERROR_BODY_LIMIT {
        message.push_str("...");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(token: Option<&str>) -> HttpBackend {
        HttpBackend::new("http://localhost:5000/api", token.map(str::to_string)).expect("backend")
    }

    #[test]
    fn base_url_gets_a_trailing_slash() {
        assert_eq!(backend(None).base_url().as_str(), "http://localhost:5000/api/");
    }

    #[test]
    fn rejects_unparsable_base() {
        assert!(matches!(
            HttpBackend::new("not a url", None),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn listing_urls_fold_their_params() {
        let backend = backend(Some("secret"));
        assert_eq!(
            backend.logs_url(Some("2024/03")).as_str(),
            "http://localhost:5000/api/logs?subfolder=2024%2F03"
        );
        assert_eq!(backend.logs_url(None).as_str(), "http://localhost:5000/api/logs");
        assert_eq!(
            backend.services_url(Some(ServiceStatus::Running)).as_str(),
            "http://localhost:5000/api/services?status=Running"
        );
    }

    #[test]
    fn download_url_carries_token_only_when_configured() {
        assert_eq!(
            backend(Some("abc")).log_download_url("app 1.log", None).as_str(),
            "http://localhost:5000/api/logs/app%201.log?token=abc"
        );
        assert_eq!(
            backend(None).log_download_url("app.log", Some("old")).as_str(),
            "http://localhost:5000/api/logs/app.log?subfolder=old"
        );
        assert_eq!(
            backend(Some("  ")).log_download_url("app.log", None).as_str(),
            "http://localhost:5000/api/logs/app.log"
        );
    }

    #[test]
    fn download_link_goes_through_the_contract() {
        let backend: Box<dyn Backend> = Box::new(backend(Some("abc")));
        assert_eq!(
            backend.download_link("app.log", Some("old")).as_deref(),
            Some("http://localhost:5000/api/logs/app.log?subfolder=old&token=abc")
        );
    }

    #[test]
    fn mutation_urls_escape_names() {
        let backend = backend(None);
        assert_eq!(
            backend
                .service_action_url("My Svc/1", ServiceAction::Restart)
                .as_str(),
            "http://localhost:5000/api/services/My%20Svc%2F1/restart"
        );
        assert_eq!(
            backend.process_url(Some(4120)).as_str(),
            "http://localhost:5000/api/processes/4120"
        );
        assert_eq!(
            backend.app_monitor_url().as_str(),
            "http://localhost:5000/api/application-monitor/config"
        );
    }

    #[test]
    fn error_bodies_are_capped() {
        let long = "x".repeat(500);
        let message = error_message(&long, None);
        assert_eq!(message.chars().count(), ERROR_BODY_LIMIT + 3);
        assert_eq!(error_message("  \n", Some("Not Found")), "Not Found");
        assert_eq!(error_message(" access denied \n", None), "access denied");
    }
}
