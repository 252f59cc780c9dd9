use crate::config::Config;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use futures_util::FutureExt;
use ratatui::{
    layout::Rect,
    widgets::{ListState, TableState},
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use sysmon_core::{
    Backend, LogFileEntry, LogFolderListing, ProcessRecord, ServiceAction, ServiceRecord,
    ServiceStatusFilter,
};
use sysmon_sync::layout::SIDEBAR_WIDTH_KEY;
use sysmon_sync::{
    promote_process, ActionError, ActionInvoker, ActionRequest, ActionToken, Clock, ConfirmPrompt,
    ConfirmVariant, ContainerBounds, ExecuteTicket, FetchDriver, FetchFn, FetchFuture,
    Invocation, KeyValueStore, LogColumn, LogTailer, NoticeBoard, Notification,
    PersistentLayoutState, PointerDragSource, PollingCache, ProcessColumn, QueryKey,
    ServiceColumn, SortSpec, ViewRow, ViewState,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const LOGS_PAGE_SIZE_KEY: &str = "sysmon.pageSize.logs";
pub const SERVICES_PAGE_SIZE_KEY: &str = "sysmon.pageSize.services";
pub const PROCESSES_PAGE_SIZE_KEY: &str = "sysmon.pageSize.processes";
pub const NUDGE_STEP_PERCENT: f64 = 2.0;

/// Everything the dashboard caches, under one shared cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Listing(LogFolderListing),
    Content(String),
    Services(Vec<ServiceRecord>),
    Processes(Vec<ProcessRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Logs,
    Services,
    Tasks,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Logs, Tab::Services, Tab::Tasks];

    pub fn label(self) -> &'static str {
        match self {
            Tab::Logs => "Logs",
            Tab::Services => "Services",
            Tab::Tasks => "Tasks",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Tab::Logs => Tab::Services,
            Tab::Services => Tab::Tasks,
            Tab::Tasks => Tab::Logs,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Tab::Logs => Tab::Tasks,
            Tab::Services => Tab::Logs,
            Tab::Tasks => Tab::Services,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogsFocus {
    Folders,
    #[default]
    Files,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Service(ServiceAction),
    Terminate(u32),
    Promote(ProcessRecord),
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Service(action) => write!(f, "{action}"),
            OpKind::Terminate(_) => f.write_str("terminate"),
            OpKind::Promote(_) => f.write_str("promote"),
        }
    }
}

#[derive(Debug)]
pub struct ActionOutcome {
    pub token: ActionToken,
    pub result: Result<(), ActionError>,
}

/// Mouse capture is always on in the terminal; "subscribing" routes drag and
/// release events to the layout until the button comes back up.
#[derive(Debug, Default)]
pub struct TerminalDrag {
    captured: bool,
}

impl TerminalDrag {
    pub fn is_captured(&self) -> bool {
        self.captured
    }
}

impl PointerDragSource for TerminalDrag {
    fn subscribe(&mut self) {
        self.captured = true;
    }

    fn unsubscribe(&mut self) {
        self.captured = false;
    }
}

pub struct LogsView {
    pub folder: Option<String>,
    pub key: QueryKey,
    pub view: ViewState<LogColumn>,
    pub table: TableState,
    pub folders: ListState,
    pub focus: LogsFocus,
}

pub struct ServicesView {
    pub status: ServiceStatusFilter,
    pub key: QueryKey,
    pub view: ViewState<ServiceColumn>,
    pub table: TableState,
}

pub struct TasksView {
    pub key: QueryKey,
    pub view: ViewState<ProcessColumn>,
    pub table: TableState,
}

pub fn listing_key(folder: Option<&str>) -> QueryKey {
    QueryKey::new("logs").with_param("subfolder", folder)
}

pub fn services_key(status: ServiceStatusFilter) -> QueryKey {
    QueryKey::new("services").with_param("status", status.query_value().map(|s| s.as_str()))
}

pub fn processes_key() -> QueryKey {
    QueryKey::new("processes")
}

pub fn listing_in<'a>(cache: &'a PollingCache<Payload>, key: &QueryKey) -> Option<&'a LogFolderListing> {
    match cache.data(key) {
        Some(Payload::Listing(listing)) => Some(listing),
        _ => None,
    }
}

pub fn files_in<'a>(cache: &'a PollingCache<Payload>, key: &QueryKey) -> &'a [LogFileEntry] {
    listing_in(cache, key)
        .map(|listing| listing.files.as_slice())
        .unwrap_or(&[])
}

pub fn services_in<'a>(cache: &'a PollingCache<Payload>, key: &QueryKey) -> &'a [ServiceRecord] {
    match cache.data(key) {
        Some(Payload::Services(services)) => services,
        _ => &[],
    }
}

pub fn processes_in<'a>(cache: &'a PollingCache<Payload>, key: &QueryKey) -> &'a [ProcessRecord] {
    match cache.data(key) {
        Some(Payload::Processes(processes)) => processes,
        _ => &[],
    }
}

fn join_folder(parent: Option<&str>, child: &str) -> String {
    let child = child.trim_matches('/');
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}/{child}", parent.trim_end_matches('/')),
        _ => child.to_string(),
    }
}

fn parent_folder(folder: &str) -> Option<String> {
    folder
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
        .filter(|parent| !parent.is_empty())
}

fn listing_fetch(backend: Arc<dyn Backend>, folder: Option<String>) -> FetchFn<Payload> {
    Arc::new(move || -> FetchFuture<Payload> {
        backend
            .list_logs(folder.clone())
            .map(|result| result.map(Payload::Listing))
            .boxed()
    })
}

fn content_fetch(backend: Arc<dyn Backend>, folder: Option<String>, file: String) -> FetchFn<Payload> {
    Arc::new(move || -> FetchFuture<Payload> {
        backend
            .read_log(file.clone(), folder.clone())
            .map(|result| result.map(Payload::Content))
            .boxed()
    })
}

fn services_fetch(backend: Arc<dyn Backend>, status: ServiceStatusFilter) -> FetchFn<Payload> {
    Arc::new(move || -> FetchFuture<Payload> {
        backend
            .list_services(status.query_value())
            .map(|result| result.map(Payload::Services))
            .boxed()
    })
}

fn processes_fetch(backend: Arc<dyn Backend>) -> FetchFn<Payload> {
    Arc::new(move || -> FetchFuture<Payload> {
        backend
            .list_processes()
            .map(|result| result.map(Payload::Processes))
            .boxed()
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn step_selection(selected: Option<usize>, len: usize, delta: isize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = selected.unwrap_or(0) as isize;
    Some((current + delta).clamp(0, len as isize - 1) as usize)
}

fn move_table(table: &mut TableState, len: usize, delta: isize) {
    table.select(step_selection(table.selected(), len, delta));
}

fn selected_row<R: ViewRow + Clone>(
    view: &mut ViewState<R::Field>,
    table: &TableState,
    rows: &[R],
) -> Option<R> {
    let page = view.apply(rows);
    let idx = table.selected()?;
    page.rows.get(idx).map(|row| (*row).clone())
}

pub struct App {
    backend: Arc<dyn Backend>,
    config: Config,
    pub cache: PollingCache<Payload>,
    driver: FetchDriver<Payload>,
    action_tx: mpsc::UnboundedSender<ActionOutcome>,
    pub invoker: ActionInvoker<OpKind>,
    pub notices: NoticeBoard,
    pub tab: Tab,
    pub logs: LogsView,
    pub services: ServicesView,
    pub tasks: TasksView,
    pub tailer: LogTailer,
    pub layout: PersistentLayoutState<TerminalDrag>,
    pub confirming: Option<ActionToken>,
    pub editing_filter: bool,
    pub show_help: bool,
    pub should_quit: bool,
    pub main_area: Option<Rect>,
    pub divider_column: Option<u16>,
}

impl App {
    pub fn new(
        config: Config,
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        driver: FetchDriver<Payload>,
        action_tx: mpsc::UnboundedSender<ActionOutcome>,
    ) -> Self {
        let mut app = Self {
            backend,
            config,
            cache: PollingCache::new(clock.clone()),
            driver,
            action_tx,
            invoker: ActionInvoker::new(),
            notices: NoticeBoard::new(clock),
            tab: Tab::Logs,
            logs: LogsView {
                folder: None,
                key: listing_key(None),
                view: ViewState::restore(
                    store.clone(),
                    LOGS_PAGE_SIZE_KEY,
                    Some(SortSpec::asc(LogColumn::Name)),
                ),
                table: TableState::default(),
                folders: ListState::default(),
                focus: LogsFocus::Files,
            },
            services: ServicesView {
                status: ServiceStatusFilter::All,
                key: services_key(ServiceStatusFilter::All),
                view: ViewState::restore(
                    store.clone(),
                    SERVICES_PAGE_SIZE_KEY,
                    Some(SortSpec::asc(ServiceColumn::DisplayName)),
                ),
                table: TableState::default(),
            },
            tasks: TasksView {
                key: processes_key(),
                view: ViewState::restore(
                    store.clone(),
                    PROCESSES_PAGE_SIZE_KEY,
                    Some(SortSpec::asc(ProcessColumn::Name)),
                ),
                table: TableState::default(),
            },
            tailer: LogTailer::new(),
            layout: PersistentLayoutState::restore(store, SIDEBAR_WIDTH_KEY, TerminalDrag::default()),
            confirming: None,
            editing_filter: false,
            show_help: false,
            should_quit: false,
            main_area: None,
            divider_column: None,
        };
        app.subscribe_tab();
        app
    }

    fn interval_for(&self, tab: Tab) -> Duration {
        match tab {
            Tab::Logs => self.config.logs_interval,
            Tab::Services => self.config.services_interval,
            Tab::Tasks => self.config.processes_interval,
        }
    }

    fn subscribe_tab(&mut self) {
        let interval = self.interval_for(self.tab);
        let backend = self.backend.clone();
        let pending = match self.tab {
            Tab::Logs => self.cache.subscribe(
                self.logs.key.clone(),
                listing_fetch(backend, self.logs.folder.clone()),
                interval,
            ),
            Tab::Services => self.cache.subscribe(
                self.services.key.clone(),
                services_fetch(backend, self.services.status),
                interval,
            ),
            Tab::Tasks => self
                .cache
                .subscribe(self.tasks.key.clone(), processes_fetch(backend), interval),
        };
        self.driver.spawn_all(pending);
    }

    fn unsubscribe_tab(&mut self) {
        match self.tab {
            Tab::Logs => {
                self.tailer.clear(&mut self.cache);
                self.cache.unsubscribe(&self.logs.key);
            }
            Tab::Services => {
                self.cache.unsubscribe(&self.services.key);
            }
            Tab::Tasks => {
                self.cache.unsubscribe(&self.tasks.key);
            }
        }
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        if tab == self.tab {
            return;
        }
        self.unsubscribe_tab();
        self.tab = tab;
        self.editing_filter = false;
        self.subscribe_tab();
    }

    pub fn active_key(&self) -> &QueryKey {
        match self.tab {
            Tab::Logs => &self.logs.key,
            Tab::Services => &self.services.key,
            Tab::Tasks => &self.tasks.key,
        }
    }

    pub fn on_tick(&mut self) {
        let due = self.cache.poll_due();
        self.driver.spawn_all(due);
        self.notices.prune();
    }

    pub fn on_focus_gained(&mut self) {
        let fetches = self.cache.revalidate_on_focus();
        self.driver.spawn_all(fetches);
    }

    pub fn refresh(&mut self) {
        let key = self.active_key().clone();
        let pending = self.cache.invalidate(&key);
        self.driver.spawn_all(pending);
        if let Some(key) = self.tailer.key().cloned() {
            let pending = self.cache.invalidate(&key);
            self.driver.spawn_all(pending);
        }
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notices.push(notification);
    }

    pub fn folder_entries(&self) -> Vec<String> {
        let mut entries = Vec::new();
        if self.logs.folder.is_some() {
            entries.push("..".to_string());
        }
        if let Some(listing) = listing_in(&self.cache, &self.logs.key) {
            entries.extend(listing.subfolders.iter().cloned());
        }
        entries
    }

    pub fn set_folder(&mut self, folder: Option<String>) {
        let folder = folder.filter(|folder| !folder.trim().is_empty());
        if folder == self.logs.folder {
            self.tailer.select_folder(folder, &mut self.cache);
            return;
        }
        self.cache.unsubscribe(&self.logs.key);
        self.tailer.select_folder(folder.clone(), &mut self.cache);
        self.logs.key = listing_key(folder.as_deref());
        self.logs.folder = folder;
        self.logs.view.sync_len(0);
        self.logs.table.select(None);
        self.logs.folders.select(None);
        info!(event = "logs_folder", folder = self.logs.folder.as_deref().unwrap_or("/"));
        if self.tab == Tab::Logs {
            self.subscribe_tab();
        }
    }

    fn open_selected_folder(&mut self) {
        let entries = self.folder_entries();
        let Some(entry) = self
            .logs
            .folders
            .selected()
            .and_then(|idx| entries.get(idx))
        else {
            return;
        };
        if entry == ".." {
            self.folder_up();
        } else {
            let next = join_folder(self.logs.folder.as_deref(), entry);
            self.set_folder(Some(next));
        }
    }

    fn folder_up(&mut self) {
        let parent = self.logs.folder.as_deref().and_then(parent_folder);
        if self.logs.folder.is_some() {
            self.set_folder(parent);
        }
    }

    pub fn selected_file(&mut self) -> Option<LogFileEntry> {
        let files = files_in(&self.cache, &self.logs.key);
        selected_row(&mut self.logs.view, &self.logs.table, files)
    }

    fn tail_selected_file(&mut self) {
        let Some(file) = self.selected_file() else {
            return;
        };
        let backend = self.backend.clone();
        let pending = self.tailer.select_file(
            Some(file.name),
            &mut self.cache,
            |folder, file| content_fetch(backend, folder, file),
        );
        self.driver.spawn_all(pending);
    }

    fn show_download_url(&mut self) {
        let file = match self.tailer.file() {
            Some(file) => Some(file.to_string()),
            None => self.selected_file().map(|entry| entry.name),
        };
        let Some(file) = file else {
            self.notify(Notification::info("Select a log file first"));
            return;
        };
        match self.backend.download_link(&file, self.logs.folder.as_deref()) {
            Some(url) => self.notify(Notification::info(format!("Download: {url}"))),
            None => self.notify(Notification::error("This backend has no download link")),
        }
    }

    pub fn set_service_filter(&mut self, status: ServiceStatusFilter) {
        if status == self.services.status {
            return;
        }
        let active = self.tab == Tab::Services;
        if active {
            self.cache.unsubscribe(&self.services.key);
        }
        self.services.status = status;
        self.services.key = services_key(status);
        self.services.view.sync_len(0);
        self.services.table.select(None);
        if active {
            self.subscribe_tab();
        }
    }

    pub fn selected_service(&mut self) -> Option<ServiceRecord> {
        let services = services_in(&self.cache, &self.services.key);
        selected_row(&mut self.services.view, &self.services.table, services)
    }

    pub fn selected_process(&mut self) -> Option<ProcessRecord> {
        let processes = processes_in(&self.cache, &self.tasks.key);
        selected_row(&mut self.tasks.view, &self.tasks.table, processes)
    }

    fn request_service_action(&mut self, action: ServiceAction) {
        let Some(service) = self.selected_service() else {
            return;
        };
        if action == ServiceAction::Stop && !service.can_stop {
            self.notify(Notification::error(format!(
                "{} cannot be stopped",
                service.label()
            )));
            return;
        }
        let mut request = ActionRequest::new(service.service_name.clone(), OpKind::Service(action))
            .invalidating_resource(self.services.key.resource())
            .on_success(format!("{} {}", service.label(), action.past_tense()));
        if action.is_destructive() {
            let variant = if action == ServiceAction::Stop {
                ConfirmVariant::Danger
            } else {
                ConfirmVariant::Warning
            };
            request = request.confirm_with(ConfirmPrompt::new(
                format!("{} service", capitalize(action.path_segment())),
                format!("{} {}?", capitalize(action.path_segment()), service.label()),
                variant,
            ));
        }
        self.submit(request);
    }

    fn request_terminate(&mut self) {
        let Some(process) = self.selected_process() else {
            return;
        };
        let request = ActionRequest::new(format!("pid:{}", process.id), OpKind::Terminate(process.id))
            .confirm_with(ConfirmPrompt::new(
                "Terminate process",
                format!("Terminate {} (PID {})?", process.name, process.id),
                ConfirmVariant::Danger,
            ))
            .invalidating(self.tasks.key.clone())
            .on_success(format!("Terminated {} (PID {})", process.name, process.id));
        self.submit(request);
    }

    fn request_promote(&mut self) {
        let Some(process) = self.selected_process() else {
            return;
        };
        let request = ActionRequest::new(format!("pid:{}", process.id), OpKind::Promote(process.clone()))
            .on_success(format!("Added {} to monitored applications", process.name));
        self.submit(request);
    }

    pub fn submit(&mut self, request: ActionRequest<OpKind>) {
        match self.invoker.invoke(request) {
            Ok(Invocation::AwaitingConfirmation(token)) => {
                self.confirming = Some(token);
            }
            Ok(Invocation::Execute(ticket)) => self.execute(ticket),
            Err(err) => self.notify(Notification::error(err.to_string())),
        }
    }

    pub fn confirm_pending(&mut self) {
        let Some(token) = self.confirming.take() else {
            return;
        };
        match self.invoker.confirm(token) {
            Ok(ticket) => self.execute(ticket),
            Err(err) => self.notify(Notification::error(err.to_string())),
        }
    }

    pub fn decline_pending(&mut self) {
        if let Some(token) = self.confirming.take() {
            self.invoker.decline(token);
        }
    }

    fn execute(&self, ticket: ExecuteTicket<OpKind>) {
        let backend = self.backend.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let ExecuteTicket {
                token,
                target_id,
                kind,
            } = ticket;
            let result = match kind {
                OpKind::Service(action) => backend
                    .control_service(target_id, action)
                    .await
                    .map_err(ActionError::from),
                OpKind::Terminate(pid) => backend
                    .terminate_process(pid)
                    .await
                    .map_err(ActionError::from),
                OpKind::Promote(process) => promote_process(backend, process).await.map(|_| ()),
            };
            let _ = tx.send(ActionOutcome { token, result });
        });
    }

    pub fn finish_action(&mut self, outcome: ActionOutcome) {
        match self
            .invoker
            .complete(outcome.token, outcome.result, &mut self.cache)
        {
            Ok(completion) => {
                self.driver.spawn_all(completion.refetches);
                self.notices.push(completion.notification);
            }
            Err(err) => {
                warn!(event = "action_completion_dropped", token = outcome.token.id(), error = %err);
            }
        }
    }

    fn edit_filter(&mut self, edit: impl FnOnce(&mut String)) {
        match self.tab {
            Tab::Logs => {
                let mut text = self.logs.view.filter_text().to_string();
                edit(&mut text);
                let files = files_in(&self.cache, &self.logs.key);
                self.logs.view.set_filter_text(text, files);
            }
            Tab::Services => {
                let mut text = self.services.view.filter_text().to_string();
                edit(&mut text);
                let services = services_in(&self.cache, &self.services.key);
                self.services.view.set_filter_text(text, services);
            }
            Tab::Tasks => {
                let mut text = self.tasks.view.filter_text().to_string();
                edit(&mut text);
                let processes = processes_in(&self.cache, &self.tasks.key);
                self.tasks.view.set_filter_text(text, processes);
            }
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.tab {
            Tab::Logs if self.logs.focus == LogsFocus::Folders => {
                let len = self.folder_entries().len();
                let next = step_selection(self.logs.folders.selected(), len, delta);
                self.logs.folders.select(next);
            }
            Tab::Logs => {
                let files = files_in(&self.cache, &self.logs.key);
                let len = self.logs.view.apply(files).rows.len();
                move_table(&mut self.logs.table, len, delta);
            }
            Tab::Services => {
                let services = services_in(&self.cache, &self.services.key);
                let len = self.services.view.apply(services).rows.len();
                move_table(&mut self.services.table, len, delta);
            }
            Tab::Tasks => {
                let processes = processes_in(&self.cache, &self.tasks.key);
                let len = self.tasks.view.apply(processes).rows.len();
                move_table(&mut self.tasks.table, len, delta);
            }
        }
    }

    fn change_page(&mut self, forward: bool) {
        match self.tab {
            Tab::Logs => {
                let files = files_in(&self.cache, &self.logs.key);
                let len = self.logs.view.apply(files).filtered_len;
                if forward {
                    self.logs.view.next_page(len);
                } else {
                    self.logs.view.prev_page();
                }
                self.logs.table.select(Some(0));
            }
            Tab::Services => {
                let services = services_in(&self.cache, &self.services.key);
                let len = self.services.view.apply(services).filtered_len;
                if forward {
                    self.services.view.next_page(len);
                } else {
                    self.services.view.prev_page();
                }
                self.services.table.select(Some(0));
            }
            Tab::Tasks => {
                let processes = processes_in(&self.cache, &self.tasks.key);
                let len = self.tasks.view.apply(processes).filtered_len;
                if forward {
                    self.tasks.view.next_page(len);
                } else {
                    self.tasks.view.prev_page();
                }
                self.tasks.table.select(Some(0));
            }
        }
    }

    fn cycle_page_size(&mut self) {
        let result = match self.tab {
            Tab::Logs => self.logs.view.cycle_page_size(),
            Tab::Services => self.services.view.cycle_page_size(),
            Tab::Tasks => self.tasks.view.cycle_page_size(),
        };
        match result {
            Ok(0) => self.notify(Notification::info("Showing all rows")),
            Ok(size) => self.notify(Notification::info(format!("{size} rows per page"))),
            Err(err) => {
                warn!(event = "page_size_persist_failed", error = %err);
                self.notify(Notification::error(format!("Could not save page size: {err}")));
            }
        }
    }

    /// Column shortcuts behave like header clicks.
    fn click_column(&mut self, index: usize) {
        match self.tab {
            Tab::Logs => {
                if let Some(column) = LogColumn::ALL.get(index) {
                    self.logs.view.click_sort(*column);
                }
            }
            Tab::Services => {
                if let Some(column) = ServiceColumn::ALL.get(index) {
                    self.services.view.click_sort(*column);
                }
            }
            Tab::Tasks => {
                if let Some(column) = ProcessColumn::ALL.get(index) {
                    self.tasks.view.click_sort(*column);
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.confirming.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.confirm_pending(),
                KeyCode::Char('n') | KeyCode::Esc => self.decline_pending(),
                _ => {}
            }
            return;
        }
        if self.editing_filter {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.editing_filter = false,
                KeyCode::Backspace => self.edit_filter(|text| {
                    text.pop();
                }),
                KeyCode::Char(c) => self.edit_filter(|text| text.push(c)),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => self.show_help = false,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Tab => self.switch_tab(self.tab.next()),
            KeyCode::BackTab => self.switch_tab(self.tab.prev()),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::PageDown | KeyCode::Char(']') => self.change_page(true),
            KeyCode::PageUp | KeyCode::Char('[') => self.change_page(false),
            KeyCode::Char('z') => self.cycle_page_size(),
            KeyCode::Char('/') => self.editing_filter = true,
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char(c @ '1'..='4') => {
                self.click_column(c as usize - '1' as usize);
            }
            _ => match self.tab {
                Tab::Logs => self.handle_logs_key(key),
                Tab::Services => self.handle_services_key(key),
                Tab::Tasks => self.handle_tasks_key(key),
            },
        }
    }

    fn handle_logs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('f') => {
                self.logs.focus = match self.logs.focus {
                    LogsFocus::Folders => LogsFocus::Files,
                    LogsFocus::Files => LogsFocus::Folders,
                };
                if self.logs.focus == LogsFocus::Folders && self.logs.folders.selected().is_none() {
                    self.logs.folders.select(Some(0));
                }
            }
            KeyCode::Enter => match self.logs.focus {
                LogsFocus::Folders => self.open_selected_folder(),
                LogsFocus::Files => self.tail_selected_file(),
            },
            KeyCode::Backspace => self.folder_up(),
            KeyCode::Char('x') => self.tailer.clear(&mut self.cache),
            KeyCode::Char('<') => {
                self.layout.nudge(-NUDGE_STEP_PERCENT);
            }
            KeyCode::Char('>') => {
                self.layout.nudge(NUDGE_STEP_PERCENT);
            }
            KeyCode::Char('o') => self.show_download_url(),
            _ => {}
        }
    }

    fn handle_services_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('f') => self.set_service_filter(self.services.status.next()),
            KeyCode::Char('u') => self.request_service_action(ServiceAction::Start),
            KeyCode::Char('d') => self.request_service_action(ServiceAction::Stop),
            KeyCode::Char('R') => self.request_service_action(ServiceAction::Restart),
            _ => {}
        }
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('K') => self.request_terminate(),
            KeyCode::Char('m') => self.request_promote(),
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if self.tab == Tab::Logs && self.on_divider(event.column, event.row) {
                    self.layout.pointer_down_on_divider();
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if !self.layout.drag_source().is_captured() {
                    return;
                }
                if let Some(area) = self.main_area {
                    let bounds = ContainerBounds {
                        left: f64::from(area.x),
                        width: f64::from(area.width),
                    };
                    self.layout.pointer_move(f64::from(event.column), bounds);
                }
            }
            MouseEventKind::Up(_) => self.layout.pointer_up(),
            MouseEventKind::ScrollDown => self.move_selection(1),
            MouseEventKind::ScrollUp => self.move_selection(-1),
            _ => {}
        }
    }

    fn on_divider(&self, col: u16, row: u16) -> bool {
        let (Some(area), Some(divider)) = (self.main_area, self.divider_column) else {
            return false;
        };
        let in_rows = row >= area.y && row < area.y.saturating_add(area.height);
        in_rows && (col == divider || col.saturating_add(1) == divider)
    }

    pub fn update_layout(&mut self, main_area: Rect, divider_column: Option<u16>) {
        self.main_area = Some(main_area);
        self.divider_column = divider_column;
    }
}
