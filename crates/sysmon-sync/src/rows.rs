use crate::pipeline::{compare_optional, compare_text, ViewRow};
use std::cmp::Ordering;
use sysmon_core::{LogFileEntry, ProcessRecord, ServiceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColumn {
    Name,
    Size,
    Modified,
}

impl LogColumn {
    pub const ALL: [LogColumn; 3] = [LogColumn::Name, LogColumn::Size, LogColumn::Modified];

    pub fn label(self) -> &'static str {
        match self {
            LogColumn::Name => "Name",
            LogColumn::Size => "Size",
            LogColumn::Modified => "Modified",
        }
    }
}

impl ViewRow for LogFileEntry {
    type Field = LogColumn;

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn compare_by(&self, other: &Self, field: LogColumn) -> Ordering {
        match field {
            LogColumn::Name => compare_text(&self.name, &other.name),
            LogColumn::Size => self.size_bytes.cmp(&other.size_bytes),
            LogColumn::Modified => self.last_modified.cmp(&other.last_modified),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceColumn {
    Name,
    DisplayName,
    Status,
    Type,
}

impl ServiceColumn {
    pub const ALL: [ServiceColumn; 4] = [
        ServiceColumn::Name,
        ServiceColumn::DisplayName,
        ServiceColumn::Status,
        ServiceColumn::Type,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ServiceColumn::Name => "Service",
            ServiceColumn::DisplayName => "Display name",
            ServiceColumn::Status => "Status",
            ServiceColumn::Type => "Type",
        }
    }
}

impl ViewRow for ServiceRecord {
    type Field = ServiceColumn;

    fn search_fields(&self) -> Vec<&str> {
        vec![self.service_name.as_str(), self.display_name.as_str()]
    }

    fn compare_by(&self, other: &Self, field: ServiceColumn) -> Ordering {
        match field {
            ServiceColumn::Name => compare_text(&self.service_name, &other.service_name),
            ServiceColumn::DisplayName => compare_text(&self.display_name, &other.display_name),
            ServiceColumn::Status => compare_text(self.status.as_str(), other.status.as_str()),
            ServiceColumn::Type => compare_text(&self.service_type, &other.service_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessColumn {
    Pid,
    Name,
    Memory,
    Started,
}

impl ProcessColumn {
    pub const ALL: [ProcessColumn; 4] = [
        ProcessColumn::Pid,
        ProcessColumn::Name,
        ProcessColumn::Memory,
        ProcessColumn::Started,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProcessColumn::Pid => "PID",
            ProcessColumn::Name => "Name",
            ProcessColumn::Memory => "Memory",
            ProcessColumn::Started => "Started",
        }
    }
}

impl ViewRow for ProcessRecord {
    type Field = ProcessColumn;

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        if let Some(path) = self.executable_path() {
            fields.push(path);
        }
        fields
    }

    fn compare_by(&self, other: &Self, field: ProcessColumn) -> Ordering {
        match field {
            ProcessColumn::Pid => self.id.cmp(&other.id),
            ProcessColumn::Name => compare_text(&self.name, &other.name),
            ProcessColumn::Memory => self.working_set_bytes.cmp(&other.working_set_bytes),
            ProcessColumn::Started => {
                compare_optional(self.start_time.as_ref(), other.start_time.as_ref())
            }
        }
    }

    fn sorts_last(&self, field: ProcessColumn) -> bool {
        field == ProcessColumn::Started && self.start_time.is_none()
    }
}
