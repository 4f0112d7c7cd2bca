//! Startup configuration.
//!
//! One [`Options`] value is built at startup and handed to
//! [`Router::with_options`](crate::Router::with_options) — no ambient
//! globals. Each modifier consumes and returns the struct:
//!
//! ```rust
//! use rove::{Options, NullLogger};
//!
//! let opts = Options::new()
//!     .app_name("users-api")
//!     .quiet_route("/healthz")
//!     .logger(NullLogger::new());
//! ```

use http::Uri;

use crate::logger::{LogRef, TraceLogger};

/// Configuration for a [`Router`](crate::Router) and the server around it.
pub struct Options {
    pub(crate) app_name: String,
    pub(crate) logger: LogRef,
    pub(crate) fallback: Option<Uri>,
    pub(crate) quiet_routes: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            app_name: "rove".to_owned(),
            logger: TraceLogger::new(),
            fallback: None,
            quiet_routes: Vec::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the application in startup logs.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Replaces the default `tracing`-backed logger.
    pub fn logger(mut self, logger: LogRef) -> Self {
        self.logger = logger;
        self
    }

    /// Configures an upstream that receives the raw request whenever no
    /// route matches, instead of a 404.
    pub fn fallback(mut self, target: Uri) -> Self {
        self.fallback = Some(target);
        self
    }

    /// Marks a path as quiet: its requests are logged at debug instead of
    /// info. Probes and other high-frequency endpoints belong here.
    pub fn quiet_route(mut self, path: impl Into<String>) -> Self {
        self.quiet_routes.push(path.into());
        self
    }
}
