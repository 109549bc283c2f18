//! HTTP traffic logging.
//!
//! [`HttpLogger`] observes requests served by an axum router and
//! [`OutboundLogger`] observes requests sent through a `reqwest` client. Both
//! produce one [`LogRecord`] per exchange and hand it to a [`LogSink`] at the
//! [`Severity`] derived from the response status. Routes matching the
//! configured ignore list produce no record.

use axum::Router;
use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use crate::{
    config::{LoggerVariant, LoggingConfig},
    error::Result,
};

pub mod capture;
pub mod logging;
pub mod outbound;
pub mod record;
pub mod route_matcher;
pub mod severity;
pub mod sink;

pub use capture::{CapturedBody, ResponseCapture};
pub use logging::{http_logging_middleware, HttpLogger};
pub use outbound::OutboundLogger;
pub use record::{LogRecord, RequestAttributes, ResponseAttributes};
pub use route_matcher::RouteMatcher;
pub use severity::Severity;
pub use sink::{LogSink, MemorySink, TracingSink};

/// Header used to correlate a record with the request that produced it.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Per-logger options that stay fixed for the logger's lifetime.
#[derive(Debug, Clone)]
pub(crate) struct CaptureSettings {
    pub variant: LoggerVariant,
    pub include_request_body: bool,
    pub include_response_body: bool,
    pub max_body_bytes: usize,
    pub redact_headers: Vec<String>,
}

impl CaptureSettings {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            variant: config.variant,
            include_request_body: config.include_request_body,
            include_response_body: config.include_response_body,
            max_body_bytes: config.max_body_bytes,
            redact_headers: config.redact_headers.clone(),
        }
    }

    pub fn reports_elapsed(&self) -> bool {
        self.variant == LoggerVariant::Inbound
    }

    /// Audit loggers record everything regardless of the ignore list.
    pub fn matcher_for(&self, routes: &[String]) -> Result<RouteMatcher> {
        match self.variant {
            LoggerVariant::Inbound => RouteMatcher::compile(routes),
            LoggerVariant::Audit => Ok(RouteMatcher::empty()),
        }
    }
}

/// State shared by the inbound and outbound loggers: fixed settings, the
/// hot-swappable ignore list and the sink records go to.
pub(crate) struct LoggerCore {
    pub settings: CaptureSettings,
    direction: Direction,
    matcher: RwLock<Arc<RouteMatcher>>,
    sink: Arc<dyn LogSink>,
}

impl LoggerCore {
    pub fn new(config: &LoggingConfig, sink: Arc<dyn LogSink>, direction: Direction) -> Result<Self> {
        let settings = CaptureSettings::from_config(config);
        let matcher = settings.matcher_for(&config.ignore_routes)?;

        Ok(Self {
            settings,
            direction,
            matcher: RwLock::new(Arc::new(matcher)),
            sink,
        })
    }

    /// The current list stays active if the new one does not compile.
    pub fn reload(&self, config: &LoggingConfig) -> Result<()> {
        let matcher = Arc::new(self.settings.matcher_for(&config.ignore_routes)?);
        match self.matcher.write() {
            Ok(mut current) => *current = matcher,
            Err(poisoned) => *poisoned.into_inner() = matcher,
        }
        Ok(())
    }

    pub fn should_ignore(&self, path: &str) -> bool {
        let matcher = match self.matcher.read() {
            Ok(matcher) => matcher.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        matcher.should_ignore(path)
    }

    pub fn elapsed_ms(&self, started: Instant) -> Option<u64> {
        self.settings
            .reports_elapsed()
            .then(|| started.elapsed().as_millis() as u64)
    }

    pub fn emit(&self, severity: Severity, record: &LogRecord) {
        self.sink.emit(severity, record);
        crate::metrics::record_emitted(self.direction, severity);
    }

    pub fn record_ignored(&self) {
        crate::metrics::record_ignored(self.direction);
    }
}

/// The loggers enabled by a [`LoggingConfig`].
#[derive(Clone)]
pub struct TrafficLogging {
    pub inbound: Option<HttpLogger>,
    pub outbound: Option<OutboundLogger>,
}

impl TrafficLogging {
    pub fn from_config(config: &LoggingConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let inbound = if config.mode.logs_inbound() {
            Some(HttpLogger::new(config, sink.clone())?)
        } else {
            None
        };
        let outbound = if config.mode.logs_outbound() {
            Some(OutboundLogger::new(config, sink)?)
        } else {
            None
        };

        Ok(Self { inbound, outbound })
    }

    /// Layers the inbound middleware onto `router` when inbound logging is enabled.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match &self.inbound {
            Some(logger) => router.layer(axum::middleware::from_fn_with_state(
                logger.clone(),
                http_logging_middleware,
            )),
            None => router,
        }
    }

    /// Recompiles the ignore lists of every enabled logger.
    pub fn reload(&self, config: &LoggingConfig) -> Result<()> {
        if let Some(inbound) = &self.inbound {
            inbound.reload(config)?;
        }
        if let Some(outbound) = &self.outbound {
            outbound.reload(config)?;
        }
        Ok(())
    }
}
