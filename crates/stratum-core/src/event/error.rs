//! # Stratum Core Event System Errors
//!
//! Errors raised by the event bus itself. Handler failures are never
//! surfaced to publishers; they are logged by the bus.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("Event type must not be empty (source: '{source_name}')")]
    InvalidEventType { source_name: String },

    #[error("Invalid event data for event '{event_type}': {details}")]
    InvalidEventData { event_type: String, details: String },
}
