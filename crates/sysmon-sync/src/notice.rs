use crate::clock::Clock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub const NOTICE_TTL: Duration = Duration::from_secs(5);
pub const NOTICE_CAPACITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

/// Transient operator notifications, newest last.
pub struct NoticeBoard {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    capacity: usize,
    items: VecDeque<(Duration, Notification)>,
}

impl NoticeBoard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, NOTICE_TTL, NOTICE_CAPACITY)
    }

    pub fn with_limits(clock: Arc<dyn Clock>, ttl: Duration, capacity: usize) -> Self {
        Self {
            clock,
            ttl,
            capacity: capacity.max(1),
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        let now = self.clock.now();
        self.items.push_back((now, notification));
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Drops expired notifications; returns true if anything was removed.
    pub fn prune(&mut self) -> bool {
        let now = self.clock.now();
        let before = self.items.len();
        self.items
            .retain(|(issued_at, _)| now.saturating_sub(*issued_at) < self.ttl);
        self.items.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().map(|(_, notification)| notification)
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.back().map(|(_, notification)| notification)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
