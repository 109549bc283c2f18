use axum::{
    body::Body,
    extract::{ConnectInfo, OriginalUri, Query, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body::Body as HttpBody;
use serde_json::Value;
use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Instant};
use tracing::debug;
use uuid::Uuid;

use super::{
    capture::CapturedBody,
    record::{body_value, header_fields, LogRecord, RequestAttributes, ResponseAttributes},
    sink::LogSink,
    Direction, LoggerCore, Severity, REQUEST_ID_HEADER,
};
use crate::{config::LoggingConfig, error::Error, error::Result};

/// Status recorded for an exchange whose response never reached the logger,
/// e.g. a client disconnect or an outer timeout dropping the request.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;
const CLIENT_CLOSED_REQUEST_MESSAGE: &str = "Client Closed Request";

/// Logs requests served by an axum router.
///
/// Cloning is cheap; clones share the sink and the ignore list.
#[derive(Clone)]
pub struct HttpLogger {
    core: Arc<LoggerCore>,
}

/// Request-side state carried from the start of a request to its completion.
struct PendingExchange {
    started: Instant,
    request_id: String,
    timestamp: String,
    request: RequestAttributes,
}

/// Owns the pending exchange until a response is handed back. Dropping it
/// with the exchange still inside (the request future was cancelled) logs
/// the exchange as closed by the client.
struct InFlight {
    logger: HttpLogger,
    pending: Option<PendingExchange>,
}

impl InFlight {
    fn set_request_body(&mut self, body: Option<Value>) {
        if let Some(pending) = self.pending.as_mut() {
            pending.request.body = body;
        }
    }

    fn complete(mut self, response: Response) -> Response {
        match self.pending.take() {
            Some(pending) => self.logger.intercept(response, pending),
            None => response,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(request_id = %pending.request_id, "Request dropped before a response was produced");
            self.logger.finish(
                pending,
                CLIENT_CLOSED_REQUEST,
                CLIENT_CLOSED_REQUEST_MESSAGE.to_string(),
                BTreeMap::new(),
                None,
            );
        }
    }
}

/// `axum::middleware::from_fn_with_state` entry point.
pub async fn http_logging_middleware(
    State(logger): State<HttpLogger>,
    request: Request,
    next: Next,
) -> Response {
    logger.observe(request, next).await
}

impl HttpLogger {
    pub fn new(config: &LoggingConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let core = LoggerCore::new(config, sink, Direction::Inbound)?;
        Ok(Self { core: Arc::new(core) })
    }

    /// Swaps in the ignore list from `config`. The current list stays active
    /// if the new one does not compile.
    pub fn reload(&self, config: &LoggingConfig) -> Result<()> {
        self.core.reload(config)
    }

    pub fn should_ignore(&self, path: &str) -> bool {
        self.core.should_ignore(path)
    }

    /// Runs the rest of the stack and logs the exchange exactly once: when
    /// the response body completes, or when this future is dropped first.
    pub async fn observe(&self, request: Request, next: Next) -> Response {
        let started = Instant::now();

        if self.should_ignore(request.uri().path()) {
            debug!(path = request.uri().path(), "Skipping ignored route");
            self.core.record_ignored();
            return next.run(request).await;
        }

        let (parts, body) = request.into_parts();
        let mut in_flight = InFlight {
            logger: self.clone(),
            pending: Some(self.describe(&parts, started)),
        };

        let body = match self.buffer_body(body).await {
            Ok((body, logged)) => {
                in_flight.set_request_body(logged);
                body
            }
            Err(e) => return in_flight.complete(e.into_response()),
        };

        let response = next.run(Request::from_parts(parts, body)).await;
        in_flight.complete(response)
    }

    fn describe(&self, parts: &Parts, started: Instant) -> PendingExchange {
        let settings = &self.core.settings;

        let url = parts
            .extensions
            .get::<OriginalUri>()
            .map(|OriginalUri(uri)| uri.to_string())
            .unwrap_or_else(|| parts.uri.to_string());
        let query = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.host().map(str::to_string));
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        PendingExchange {
            started,
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request: RequestAttributes {
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                url,
                headers: header_fields(&parts.headers, &settings.redact_headers),
                query,
                body: None,
                remote_addr,
                host,
                protocol: format!("{:?}", parts.version),
            },
        }
    }

    /// Only bodies with a known, bounded size are buffered; anything else
    /// streams through untouched and is left out of the record.
    async fn buffer_body(&self, body: Body) -> Result<(Body, Option<Value>)> {
        let settings = &self.core.settings;
        let buffer = settings.include_request_body
            && body
                .size_hint()
                .upper()
                .is_some_and(|len| len <= settings.max_body_bytes as u64);
        if !buffer {
            return Ok((body, None));
        }

        let bytes = axum::body::to_bytes(body, settings.max_body_bytes)
            .await
            .map_err(Error::RequestBody)?;
        let logged = (!bytes.is_empty()).then(|| body_value(&bytes, settings.max_body_bytes));
        Ok((Body::from(bytes), logged))
    }

    fn intercept(&self, response: Response, pending: PendingExchange) -> Response {
        let (parts, body) = response.into_parts();
        let status = parts.status;
        let headers = header_fields(&parts.headers, &self.core.settings.redact_headers);

        let logger = self.clone();
        let body = CapturedBody::new(body, move |captured| {
            logger.finish(
                pending,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                captured,
            );
        });

        Response::from_parts(parts, Body::new(body))
    }

    fn finish(
        &self,
        pending: PendingExchange,
        status_code: u16,
        status_message: String,
        headers: BTreeMap<String, String>,
        captured: Option<Bytes>,
    ) {
        let settings = &self.core.settings;
        let elapsed_ms = self.core.elapsed_ms(pending.started);
        let body = if settings.include_response_body {
            captured.map(|bytes| body_value(&bytes, settings.max_body_bytes))
        } else {
            None
        };

        let record = LogRecord {
            message: LogRecord::summary(
                &pending.request.method,
                &pending.request.url,
                status_code,
                &status_message,
                elapsed_ms,
            ),
            request_id: pending.request_id,
            timestamp: pending.timestamp,
            elapsed_ms,
            request: pending.request,
            response: ResponseAttributes {
                status_code,
                status_message,
                headers,
                body,
            },
        };

        self.core.emit(Severity::from_status(status_code), &record);
    }
}
