//! Observability subsystem
//!
//! - Structured logging (JSON lines, deterministic key order)
//! - Typed lifecycle events
//! - Counter metrics
//!
//! Observability is read-only: it never changes what an operation returns,
//! and a failed log write never fails the operation.
//!
//! ```ignore
//! use geoquery::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::TransactionCommit, &[("success", "3")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event at the severity its kind implies.
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_error() {
        Severity::Error
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
