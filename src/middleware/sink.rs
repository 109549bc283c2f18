use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::{record::LogRecord, severity::Severity};

/// Destination for finished log records.
///
/// Implementations are shared by every in-flight request and must tolerate
/// concurrent calls.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, severity: Severity, record: &LogRecord);
}

/// Emits records as `tracing` events under the `traffic_logger::http` target.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

macro_rules! emit_event {
    ($level:ident, $record:ident, $json:ident) => {
        $level!(
            target: "traffic_logger::http",
            request_id = %$record.request_id,
            method = %$record.request.method,
            path = %$record.request.path,
            status = $record.response.status_code,
            elapsed_ms = ?$record.elapsed_ms,
            record = %$json,
            "{}",
            $record.message
        )
    };
}

impl LogSink for TracingSink {
    fn emit(&self, severity: Severity, record: &LogRecord) {
        let json = serde_json::to_string(record).unwrap_or_default();
        match severity {
            Severity::Error => emit_event!(error, record, json),
            Severity::Warn => emit_event!(warn, record, json),
            Severity::Info => emit_event!(info, record, json),
        }
    }
}

/// Keeps every record in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(Severity, LogRecord)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Severity, LogRecord)> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while holding the lock cannot leave a half-pushed record, so
    /// a poisoned buffer is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<(Severity, LogRecord)>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn emit(&self, severity: Severity, record: &LogRecord) {
        self.lock().push((severity, record.clone()));
    }
}
