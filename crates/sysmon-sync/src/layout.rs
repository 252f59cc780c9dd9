use crate::store::KeyValueStore;
use std::sync::Arc;
use tracing::warn;

pub const SIDEBAR_WIDTH_KEY: &str = "sysmon.logs.sidebarWidth";
pub const MIN_WIDTH_PERCENT: f64 = 20.0;
pub const MAX_WIDTH_PERCENT: f64 = 60.0;
pub const DEFAULT_WIDTH_PERCENT: f64 = 33.0;

/// Delivers pointer move/up events for the whole surface while subscribed.
pub trait PointerDragSource {
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerBounds {
    pub left: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Resizing,
}

pub fn clamp_width(value: f64) -> f64 {
    if value.is_nan() {
        return DEFAULT_WIDTH_PERCENT;
    }
    value.clamp(MIN_WIDTH_PERCENT, MAX_WIDTH_PERCENT)
}

pub struct PersistentLayoutState<P> {
    width_percent: f64,
    phase: DragPhase,
    key: String,
    store: Arc<dyn KeyValueStore>,
    drag: P,
}

impl<P: PointerDragSource> PersistentLayoutState<P> {
    pub fn restore(store: Arc<dyn KeyValueStore>, key: impl Into<String>, drag: P) -> Self {
        let key = key.into();
        let width_percent = store
            .get(&key)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .map(clamp_width)
            .unwrap_or(DEFAULT_WIDTH_PERCENT);
        Self {
            width_percent,
            phase: DragPhase::Idle,
            key,
            store,
            drag,
        }
    }

    pub fn width_percent(&self) -> f64 {
        self.width_percent
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn drag_source(&self) -> &P {
        &self.drag
    }

    pub fn pointer_down_on_divider(&mut self) {
        if self.phase == DragPhase::Resizing {
            return;
        }
        self.phase = DragPhase::Resizing;
        self.drag.subscribe();
    }

    /// Recomputes the width from the pointer's position inside `bounds`.
    /// Ignored unless a resize is in progress.
    pub fn pointer_move(&mut self, x: f64, bounds: ContainerBounds) -> Option<f64> {
        if self.phase != DragPhase::Resizing {
            return None;
        }
        if !x.is_finite() || !bounds.width.is_finite() || bounds.width <= 0.0 {
            return None;
        }
        let percent = (x - bounds.left) / bounds.width * 100.0;
        Some(self.apply(percent))
    }

    pub fn pointer_up(&mut self) {
        if self.phase == DragPhase::Idle {
            return;
        }
        self.phase = DragPhase::Idle;
        self.drag.unsubscribe();
    }

    pub fn nudge(&mut self, delta_percent: f64) -> f64 {
        self.apply(self.width_percent + delta_percent)
    }

    fn apply(&mut self, percent: f64) -> f64 {
        self.width_percent = clamp_width(percent);
        if let Err(err) = self
            .store
            .set(&self.key, &format!("{:.2}", self.width_percent))
        {
            warn!(event = "layout_persist_failed", key = %self.key, error = %err);
        }
        self.width_percent
    }
}
