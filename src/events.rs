//! Structured event stream
//!
//! Every crawl transition (navigation, cleanup stats, extraction counts,
//! classification, adaptations, waits, human prompts) is emitted as an
//! `Event` so an operator can follow a stalled source without reading code.
//! Sinks are pure consumers; the crawl never depends on what they do.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Number of recent messages kept for the advisory context
const DEFAULT_ACTIVITY_CAPACITY: usize = 20;

/// Crawl component that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Frontier,
    Planner,
    Pipeline,
    Brain,
    Human,
    Correction,
    Orchestrator,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Frontier => "frontier",
            Self::Planner => "planner",
            Self::Pipeline => "pipeline",
            Self::Brain => "brain",
            Self::Human => "human",
            Self::Correction => "correction",
            Self::Orchestrator => "orchestrator",
        };
        f.write_str(name)
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// One entry of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub component: Component,
    pub level: Level,
    /// Name of the source being crawled, if any
    pub source: Option<String>,
    pub message: String,
}

/// Consumer of the event stream
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        let source = event.source.as_deref().unwrap_or("-");
        match event.level {
            Level::Debug => {
                tracing::debug!(component = %event.component, source, "{}", event.message)
            }
            Level::Info => {
                tracing::info!(component = %event.component, source, "{}", event.message)
            }
            Level::Warn => {
                tracing::warn!(component = %event.component, source, "{}", event.message)
            }
            Level::Error => {
                tracing::error!(component = %event.component, source, "{}", event.message)
            }
        }
    }
}

/// Per-crawl event emitter that remembers its most recent messages
///
/// Tags every event with the source name, forwards it to the shared sink, and
/// keeps a bounded tail used as the "recent activity" of the advisory context.
pub struct ActivityLog {
    inner: Arc<dyn EventSink>,
    source: String,
    recent: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(inner: Arc<dyn EventSink>, source: impl Into<String>) -> Self {
        Self {
            inner,
            source: source.into(),
            recent: Mutex::new(VecDeque::with_capacity(DEFAULT_ACTIVITY_CAPACITY)),
            capacity: DEFAULT_ACTIVITY_CAPACITY,
        }
    }

    pub fn log(&self, component: Component, level: Level, message: impl Into<String>) {
        let message = message.into();
        {
            let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(format!("[{}] {}", component, message));
        }
        self.inner.emit(Event {
            component,
            level,
            source: Some(self.source.clone()),
            message,
        });
    }

    pub fn debug(&self, component: Component, message: impl Into<String>) {
        self.log(component, Level::Debug, message);
    }

    pub fn info(&self, component: Component, message: impl Into<String>) {
        self.log(component, Level::Info, message);
    }

    pub fn warn(&self, component: Component, message: impl Into<String>) {
        self.log(component, Level::Warn, message);
    }

    pub fn error(&self, component: Component, message: impl Into<String>) {
        self.log(component, Level::Error, message);
    }

    /// The most recent messages, oldest first, one per line
    pub fn snippet(&self) -> String {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}
