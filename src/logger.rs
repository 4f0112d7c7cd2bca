//! The leveled logging interface the dispatch core writes to.
//!
//! The core only depends on [`Logger`], never on a concrete backend. The
//! default implementation, [`TraceLogger`], emits through [`tracing`] so the
//! process picks the subscriber (fmt, JSON, whatever). [`NullLogger`]
//! swallows everything — handy in tests.
//!
//! A logger can be *scoped*: [`Logger::scoped`] derives a new instance that
//! attaches a structured value (a request ID, a tenant, ...) to every line it
//! emits, without touching the original logger or its sink.

use std::sync::Arc;

/// Log verbosity, most to least severe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Shared handle to a logger implementation.
pub type LogRef = Arc<dyn Logger>;

/// Leveled logging consumed by the router and dispatcher.
pub trait Logger: Send + Sync {
    /// Emits one line at the given level.
    fn log(&self, level: Level, msg: &str);

    /// Derives a logger that carries `scope` as structured metadata on every
    /// subsequent line. The receiver is left untouched.
    fn scoped(&self, scope: serde_json::Value) -> LogRef;

    fn error(&self, msg: &str) {
        self.log(Level::Error, msg);
    }

    fn warn(&self, msg: &str) {
        self.log(Level::Warn, msg);
    }

    fn info(&self, msg: &str) {
        self.log(Level::Info, msg);
    }

    fn debug(&self, msg: &str) {
        self.log(Level::Debug, msg);
    }

    fn trace(&self, msg: &str) {
        self.log(Level::Trace, msg);
    }
}

// ── TraceLogger ───────────────────────────────────────────────────────────────

/// Default [`Logger`]: forwards to the `tracing` macros.
///
/// The scope, if any, appears as a `scope` field on every event, so a JSON
/// subscriber renders it as structured data rather than message text.
#[derive(Clone, Debug, Default)]
pub struct TraceLogger {
    scope: Option<String>,
}

impl TraceLogger {
    pub fn new() -> LogRef {
        Arc::new(Self::default())
    }
}

impl Logger for TraceLogger {
    fn log(&self, level: Level, msg: &str) {
        let scope = self.scope.as_deref();
        match level {
            Level::Error => tracing::error!(scope, "{msg}"),
            Level::Warn => tracing::warn!(scope, "{msg}"),
            Level::Info => tracing::info!(scope, "{msg}"),
            Level::Debug => tracing::debug!(scope, "{msg}"),
            Level::Trace => tracing::trace!(scope, "{msg}"),
        }
    }

    fn scoped(&self, scope: serde_json::Value) -> LogRef {
        Arc::new(Self { scope: Some(scope.to_string()) })
    }
}

// ── NullLogger ────────────────────────────────────────────────────────────────

/// A [`Logger`] that discards everything.
pub struct NullLogger;

impl NullLogger {
    pub fn new() -> LogRef {
        Arc::new(Self)
    }
}

impl Logger for NullLogger {
    fn log(&self, _level: Level, _msg: &str) {}

    fn scoped(&self, _scope: serde_json::Value) -> LogRef {
        Arc::new(Self)
    }
}
