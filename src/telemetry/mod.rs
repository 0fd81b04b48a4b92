//! Structured telemetry for validation attempts
//!
//! Every key resolution and every token validation produces exactly one
//! [`TelemetryEvent`]. Events are handed to a [`TelemetrySink`], which owns
//! delivery. Sinks never report failures back to the caller, so a broken
//! telemetry backend cannot change a validation result.
//!
//! ## Sinks
//!
//! - [`ElasticsearchSink`]: indexes events into an Elasticsearch index from a
//!   background worker
//! - [`TracingSink`]: forwards events to `tracing`
//! - [`MemorySink`]: keeps events in memory, mostly useful in tests

pub mod elasticsearch;

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::error::Error;

pub use elasticsearch::ElasticsearchConfig;
pub use elasticsearch::ElasticsearchSink;
pub use elasticsearch::SinkWorker;

const UNKNOWN_MACHINE: &str = "unknown";

/// Severity of a telemetry event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Info,
    Error,
}

/// Request-correlating fields attached to every event
///
/// For key resolution these are whatever the caller chose to tag the
/// construction with; none of them influence which key is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub token: String,
    pub user_id: String,
    pub entity_id: String,
}

impl Correlation {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// One record per validation attempt, shaped for document indexing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    /// Elapsed milliseconds from operation entry to the point of emission
    pub request_duration: u64,
    pub machine_name: String,
    pub token: String,
    pub user_id: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Destination for telemetry events
///
/// Implementations must tolerate concurrent calls from many in-flight
/// validations and must not block for long: `index_document` runs on the
/// validation path.
pub trait TelemetrySink: Send + Sync {
    fn index_document(&self, event: TelemetryEvent);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn index_document(&self, event: TelemetryEvent) {
        (**self).index_document(event)
    }
}

/// Cloneable handle used by the key provider and the validator to emit events
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
    machine_name: Arc<str>,
}

impl Telemetry {
    pub fn new(sink: impl TelemetrySink + 'static) -> Self {
        Self::from_shared(Arc::new(sink))
    }

    pub fn from_shared(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink,
            machine_name: Arc::from(detect_machine_name()),
        }
    }

    /// Override the host name reported in events
    pub fn with_machine_name(mut self, machine_name: impl Into<String>) -> Self {
        self.machine_name = Arc::from(machine_name.into());
        self
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    pub(crate) fn info(&self, message: &str, started: Instant, correlation: &Correlation) {
        let event = self.event(Level::Info, message, started, correlation);
        self.sink.index_document(event);
    }

    pub(crate) fn error(
        &self,
        message: &str,
        error: &Error,
        started: Instant,
        correlation: &Correlation,
    ) {
        let mut event = self.event(Level::Error, message, started, correlation);
        event.exception = Some(error.describe());
        event.stack_trace = Some(Backtrace::force_capture().to_string());
        self.sink.index_document(event);
    }

    fn event(
        &self,
        level: Level,
        message: &str,
        started: Instant,
        correlation: &Correlation,
    ) -> TelemetryEvent {
        TelemetryEvent {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            request_duration: u64::try_from(started.elapsed().as_millis())
                .unwrap_or(u64::MAX),
            machine_name: self.machine_name.to_string(),
            token: correlation.token.clone(),
            user_id: correlation.user_id.clone(),
            entity_id: correlation.entity_id.clone(),
            exception: None,
            stack_trace: None,
        }
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("machine_name", &self.machine_name)
            .finish_non_exhaustive()
    }
}

fn detect_machine_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| UNKNOWN_MACHINE.to_string())
}

/// Sink that writes events as `tracing` records
///
/// The token itself is left out of the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn index_document(&self, event: TelemetryEvent) {
        match event.level {
            Level::Info => tracing::info!(
                duration_ms = event.request_duration,
                machine = %event.machine_name,
                user_id = %event.user_id,
                entity_id = %event.entity_id,
                "{}",
                event.message
            ),
            Level::Error => tracing::error!(
                duration_ms = event.request_duration,
                machine = %event.machine_name,
                user_id = %event.user_id,
                entity_id = %event.entity_id,
                exception = event.exception.as_deref().unwrap_or_default(),
                "{}",
                event.message
            ),
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the recorded events
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TelemetrySink for MemorySink {
    fn index_document(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlation() -> Correlation {
        Correlation::new("eyJ.token", "user-1", "entity-1")
    }

    #[test]
    fn info_event_carries_correlation_and_machine() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::from_shared(sink.clone()).with_machine_name("node-a");

        telemetry.info("Certificate loaded successfully.", Instant::now(), &correlation());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::Info);
        assert_eq!(event.message, "Certificate loaded successfully.");
        assert_eq!(event.machine_name, "node-a");
        assert_eq!(event.token, "eyJ.token");
        assert_eq!(event.user_id, "user-1");
        assert_eq!(event.entity_id, "entity-1");
        assert!(event.exception.is_none());
        assert!(event.stack_trace.is_none());
    }

    #[test]
    fn error_event_carries_exception_and_stack_trace() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::from_shared(sink.clone());

        let error = Error::ResourceNotFound("resources/certificate.pem".into());
        telemetry.error(
            "Failed to extract public key from certificate.",
            &error,
            Instant::now(),
            &correlation(),
        );

        let event = sink.drain().pop().expect("one event");
        assert_eq!(event.level, Level::Error);
        assert_eq!(
            event.exception.as_deref(),
            Some("Certificate resource 'resources/certificate.pem' not found")
        );
        assert!(sink.is_empty());

        // Captured regardless of RUST_BACKTRACE
        let stack_trace = event.stack_trace.expect("stack trace");
        assert_ne!(stack_trace, "disabled backtrace");
        assert!(stack_trace.lines().count() > 1, "{stack_trace}");
    }

    #[test]
    fn event_serializes_with_index_field_names() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::from_shared(sink.clone()).with_machine_name("node-a");
        telemetry.info("Token validation successful.", Instant::now(), &correlation());

        let json = serde_json::to_value(&sink.events()[0]).unwrap();
        assert_eq!(json["level"], "Info");
        assert_eq!(json["message"], "Token validation successful.");
        assert_eq!(json["machineName"], "node-a");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["entityId"], "entity-1");
        assert!(json["requestDuration"].is_u64());
        assert!(json["timestamp"].is_string());
        assert!(json.get("exception").is_none());
        assert!(json.get("stackTrace").is_none());
    }

    #[test]
    fn detects_a_machine_name() {
        let telemetry = Telemetry::new(MemorySink::new());
        assert!(!telemetry.machine_name().is_empty());
    }
}
