//! Pennant Telemetry: anonymous, best-effort usage reporting.
//!
//! Each call to [`send_event`] collects a device fingerprint and a project
//! fingerprint, merges them with the caller's event type and database
//! provider, and posts the result to the telemetry endpoint on a detached
//! task. Paths, git remotes and machine ids only leave the process as
//! SHA-256 digests. The call never blocks on the network and never fails.
//!
//! Opting out: `pennant telemetry disable` (stored as `telemetry.disabled`
//! in the user's preference store) or `PENNANT_TELEMETRY_DISABLED=1`.
//! `PENNANT_TELEMETRY_DEBUG=1` prints the payload instead of sending it and
//! `PENNANT_TELEMETRY_ENDPOINT` replaces the endpoint base URL.

pub mod collector;
pub mod env;
pub mod error;
pub mod models;
pub mod notice;
pub mod reporter;
pub mod settings;
pub mod store;
pub mod transport;

pub use collector::{DeviceSource, SystemDevice};
pub use env::EnvSource;
pub use error::{Result, TelemetryError};
pub use models::{DeviceInfo, EventRequest, ProjectInfo, SchemaSummary, TelemetryEvent};
pub use reporter::{Dispatch, TelemetryReporter};
pub use settings::TelemetrySettings;
pub use store::PreferenceStore;
pub use transport::{HttpTransport, Transport};

/// Report an event with the default reporter. Returns immediately and never
/// fails.
pub fn send_event(settings: &TelemetrySettings, request: &EventRequest) {
    if settings.disabled {
        return;
    }
    TelemetryReporter::new().send_event(settings, request);
}
