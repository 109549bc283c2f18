use std::{collections::BTreeMap, sync::Arc, time::Instant};
use tracing::debug;
use uuid::Uuid;

use super::{
    record::{body_value, header_fields, LogRecord, RequestAttributes, ResponseAttributes},
    sink::LogSink,
    Direction, LoggerCore, Severity, REQUEST_ID_HEADER,
};
use crate::{config::LoggingConfig, error::Result};

/// Logs requests this service sends through a `reqwest::Client`.
///
/// The response is handed back untouched, so its body never appears in the
/// record.
#[derive(Clone)]
pub struct OutboundLogger {
    core: Arc<LoggerCore>,
}

struct PendingCall {
    started: Instant,
    request_id: String,
    timestamp: String,
    request: RequestAttributes,
}

impl OutboundLogger {
    pub fn new(config: &LoggingConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let core = LoggerCore::new(config, sink, Direction::Outbound)?;
        Ok(Self { core: Arc::new(core) })
    }

    pub fn reload(&self, config: &LoggingConfig) -> Result<()> {
        self.core.reload(config)
    }

    pub fn should_ignore(&self, path: &str) -> bool {
        self.core.should_ignore(path)
    }

    /// Executes `request` on `client`, logging the exchange. Transport errors
    /// are logged and then returned as they came.
    pub async fn send(
        &self,
        client: &reqwest::Client,
        request: reqwest::Request,
    ) -> reqwest::Result<reqwest::Response> {
        let started = Instant::now();

        if self.should_ignore(request.url().path()) {
            debug!(url = %request.url(), "Skipping ignored outbound route");
            self.core.record_ignored();
            return client.execute(request).await;
        }

        let pending = self.describe(&request, started);

        match client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                self.finish(
                    pending,
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default().to_string(),
                    header_fields(response.headers(), &self.core.settings.redact_headers),
                    Severity::from_status(status.as_u16()),
                );
                Ok(response)
            }
            Err(e) => {
                let status_code = e.status().map(|s| s.as_u16()).unwrap_or(0);
                self.finish(pending, status_code, e.to_string(), BTreeMap::new(), Severity::Error);
                Err(e)
            }
        }
    }

    fn describe(&self, request: &reqwest::Request, started: Instant) -> PendingCall {
        let settings = &self.core.settings;
        let url = request.url();

        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .filter(|bytes| settings.include_request_body && !bytes.is_empty())
            .map(|bytes| body_value(bytes, settings.max_body_bytes));
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        PendingCall {
            started,
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request: RequestAttributes {
                method: request.method().to_string(),
                path: url.path().to_string(),
                url: url.to_string(),
                headers: header_fields(request.headers(), &settings.redact_headers),
                query: url.query_pairs().into_owned().collect(),
                body,
                remote_addr: None,
                host: url.host_str().map(str::to_string),
                protocol: format!("{:?}", request.version()),
            },
        }
    }

    fn finish(
        &self,
        pending: PendingCall,
        status_code: u16,
        status_message: String,
        headers: BTreeMap<String, String>,
        severity: Severity,
    ) {
        let elapsed_ms = self.core.elapsed_ms(pending.started);

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
                body: None,
            },
        };

        self.core.emit(severity, &record);
    }
}
