//! Telemetry reporting: builds an event and hands it to the transport.
//!
//! [`TelemetryReporter::send_event`] never fails and never blocks on the
//! network. Telemetry problems must not affect the host application, so
//! every error (and any panic) is swallowed at that boundary.
//! [`TelemetryReporter::try_send_event`] exposes the same steps with their
//! outcome for tests.
//!
//! A panic is contained but the process panic hook still runs first, so the
//! default hook prints its message to stderr. The library does not replace
//! the hook: it is process-wide and belongs to the host.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::collector::{collect_device, collect_project, DeviceSource, SystemDevice};
use crate::env::EnvSource;
use crate::error::Result;
use crate::models::{EventRequest, TelemetryEvent};
use crate::settings::TelemetrySettings;
use crate::transport::{HttpTransport, Transport, UnavailableTransport};

/// What a dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Opted out; nothing was collected or sent.
    Disabled,
    /// Debug mode; the payload went to stderr.
    Logged,
    /// Handed to the transport.
    Submitted,
}

/// Sends telemetry events.
#[derive(Clone)]
pub struct TelemetryReporter {
    device: Arc<dyn DeviceSource>,
    transport: Arc<dyn Transport>,
    env: EnvSource,
}

impl TelemetryReporter {
    /// A reporter reading the real machine and environment, posting over HTTP.
    pub fn new() -> Self {
        let transport: Arc<dyn Transport> = match HttpTransport::new() {
            Ok(http) => Arc::new(http),
            Err(e) => {
                debug!(error = %e, "telemetry HTTP client unavailable");
                Arc::new(UnavailableTransport)
            }
        };
        Self {
            device: Arc::new(SystemDevice),
            transport,
            env: EnvSource::Process,
        }
    }

    /// Replace the machine-facts source.
    pub fn with_device_source(mut self, device: impl DeviceSource + 'static) -> Self {
        self.device = Arc::new(device);
        self
    }

    /// Replace the network hand-off.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Read environment variables from `env` instead of the process.
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Report an event. Returns immediately and never fails.
    pub fn send_event(&self, settings: &TelemetrySettings, request: &EventRequest) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_send_event(settings, request)
        }));
        match outcome {
            Ok(Ok(dispatch)) => {
                trace!(?dispatch, event_type = %request.event_type, "telemetry dispatched")
            }
            Ok(Err(e)) => debug!(error = %e, "telemetry event dropped"),
            Err(_) => debug!("telemetry event dropped after panic"),
        }
    }

    /// The dispatch steps, with their outcome.
    ///
    /// The opt-out is checked first, so a disabled reporter never collects
    /// anything, even in debug mode.
    pub fn try_send_event(
        &self,
        settings: &TelemetrySettings,
        request: &EventRequest,
    ) -> Result<Dispatch> {
        if settings.is_disabled(&self.env) {
            return Ok(Dispatch::Disabled);
        }

        let event = self.build_event(settings, request);
        let url = settings.event_url(&self.env);

        if settings.is_debug(&self.env) {
            let payload = serde_json::to_string_pretty(&event)?;
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "[telemetry] POST {url}")?;
            writeln!(stderr, "{payload}")?;
            return Ok(Dispatch::Logged);
        }

        let body = serde_json::to_vec(&event)?;
        self.transport.submit(&url, body)?;
        Ok(Dispatch::Submitted)
    }

    /// Collect the device and project fingerprints and merge in the
    /// caller-supplied fields. Caller values own `eventType` and `dbProvider`.
    pub fn build_event(
        &self,
        settings: &TelemetrySettings,
        request: &EventRequest,
    ) -> TelemetryEvent {
        TelemetryEvent {
            device: collect_device(
                self.device.as_ref(),
                &self.env,
                &settings.runtime_version,
            ),
            project: collect_project(
                &request.cwd,
                request.schema.as_ref(),
                settings,
                &self.env,
            ),
            event_type: request.event_type.clone(),
            db_provider: request.db_provider.clone(),
        }
    }
}

impl Default for TelemetryReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::one_way_hash;
    use crate::env::{DEBUG_VAR, DISABLED_VAR, ENDPOINT_VAR};
    use crate::error::TelemetryError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingDevice {
        calls: Arc<AtomicUsize>,
    }

    impl DeviceSource for CountingDevice {
        fn device_hash(&self) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some("device-hashed".into())
        }
        fn os(&self) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            "test-os".into()
        }
        fn os_version(&self) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some("1.0".into())
        }
    }

    #[derive(Default, Clone)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl Transport for RecordingTransport {
        fn submit(&self, url: &str, body: Vec<u8>) -> Result<()> {
            self.sent.lock().unwrap().push((url.to_string(), body));
            Ok(())
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn submit(&self, _url: &str, _body: Vec<u8>) -> Result<()> {
            Err(TelemetryError::Transport("network unreachable".into()))
        }
    }

    struct PanickingTransport;

    impl Transport for PanickingTransport {
        fn submit(&self, _url: &str, _body: Vec<u8>) -> Result<()> {
            panic!("transport exploded");
        }
    }

    fn stub_reporter(
        env: EnvSource,
    ) -> (TelemetryReporter, RecordingTransport, Arc<AtomicUsize>) {
        let transport = RecordingTransport::default();
        let device = CountingDevice::default();
        let calls = device.calls.clone();
        let reporter = TelemetryReporter::new()
            .with_device_source(device)
            .with_transport(transport.clone())
            .with_env(env);
        (reporter, transport, calls)
    }

    fn request() -> EventRequest {
        EventRequest::new("test-event", "/repo").with_db_provider("postgresql")
    }

    #[test]
    fn disabled_settings_skip_everything() {
        let (reporter, transport, device_calls) = stub_reporter(EnvSource::empty());
        let settings = TelemetrySettings {
            disabled: true,
            ..Default::default()
        };

        let outcome = reporter.try_send_event(&settings, &request()).unwrap();

        assert_eq!(outcome, Dispatch::Disabled);
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(device_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn call_time_env_opt_out_skips_everything() {
        let (reporter, transport, device_calls) =
            stub_reporter(EnvSource::fixed([(DISABLED_VAR, "1")]));

        reporter.send_event(&TelemetrySettings::default(), &request());

        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(device_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disable_takes_precedence_over_debug() {
        let (reporter, transport, device_calls) =
            stub_reporter(EnvSource::fixed([(DISABLED_VAR, "1"), (DEBUG_VAR, "1")]));

        let outcome = reporter
            .try_send_event(&TelemetrySettings::default(), &request())
            .unwrap();

        assert_eq!(outcome, Dispatch::Disabled);
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(device_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn debug_logs_instead_of_sending() {
        let (reporter, transport, _) = stub_reporter(EnvSource::fixed([(DEBUG_VAR, "1")]));

        let outcome = reporter
            .try_send_event(&TelemetrySettings::default(), &request())
            .unwrap();

        assert_eq!(outcome, Dispatch::Logged);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_setting_logs_instead_of_sending() {
        let (reporter, transport, _) = stub_reporter(EnvSource::empty());
        let settings = TelemetrySettings {
            debug: true,
            ..Default::default()
        };

        let outcome = reporter.try_send_event(&settings, &request()).unwrap();

        assert_eq!(outcome, Dispatch::Logged);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_transport_does_not_propagate() {
        let reporter = TelemetryReporter::new()
            .with_device_source(CountingDevice::default())
            .with_transport(FailingTransport)
            .with_env(EnvSource::empty());

        let err = reporter
            .try_send_event(&TelemetrySettings::default(), &request())
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Transport(_)));

        // The public entry point swallows the same failure.
        reporter.send_event(&TelemetrySettings::default(), &request());
    }

    #[test]
    fn panicking_transport_does_not_propagate() {
        let reporter = TelemetryReporter::new()
            .with_device_source(CountingDevice::default())
            .with_transport(PanickingTransport)
            .with_env(EnvSource::empty());

        reporter.send_event(&TelemetrySettings::default(), &request());
    }

    #[test]
    fn endpoint_override_used() {
        let (reporter, transport, _) =
            stub_reporter(EnvSource::fixed([(ENDPOINT_VAR, "https://example.test")]));

        reporter.send_event(&TelemetrySettings::default(), &request());

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://example.test/v1/event");
    }

    #[test]
    fn sends_one_event_to_default_endpoint() {
        let (reporter, transport, _) = stub_reporter(EnvSource::empty());

        reporter.send_event(&TelemetrySettings::default(), &request());

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (url, body) = &sent[0];
        assert_eq!(url, "https://telemetry.pennant.dev/v1/event");

        let payload: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(payload["deviceHash"], "device-hashed");
        assert_eq!(payload["os"], "test-os");
        assert_eq!(payload["dbProvider"], "postgresql");
        assert_eq!(payload["eventType"], "test-event");
        assert_eq!(payload["cwdHash"], one_way_hash("/repo"));
        assert!(payload["locale"].is_null());

        let expected = serde_json::to_value(
            reporter.build_event(&TelemetrySettings::default(), &request()),
        )
        .unwrap();
        assert_eq!(payload, expected);
    }

    #[test]
    fn payload_never_contains_raw_cwd() {
        let (reporter, transport, _) = stub_reporter(EnvSource::empty());
        let req = EventRequest::new("build", "/home/someone/secret-project");

        reporter.send_event(&TelemetrySettings::default(), &req);

        let sent = transport.sent.lock().unwrap();
        let body = String::from_utf8(sent[0].1.clone()).unwrap();
        assert!(!body.contains("someone"));
        assert!(!body.contains("secret-project"));
    }

    #[test]
    fn missing_db_provider_is_null() {
        let (reporter, transport, _) = stub_reporter(EnvSource::empty());

        reporter.send_event(
            &TelemetrySettings::default(),
            &EventRequest::new("dev", "/repo"),
        );

        let sent = transport.sent.lock().unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert!(payload["dbProvider"].is_null());
        assert!(payload["listCount"].is_null());
    }

    #[test]
    fn runtime_version_from_settings() {
        let (reporter, _, _) = stub_reporter(EnvSource::empty());
        let settings = TelemetrySettings::default().with_runtime_version("4.2.0");
        let event = reporter.build_event(&settings, &request());
        assert_eq!(event.device.runtime_version, "4.2.0");
    }

    #[tokio::test]
    async fn posts_event_over_http() {
        use std::time::{Duration, Instant};
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/event"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = TelemetryReporter::new()
            .with_device_source(CountingDevice::default())
            .with_env(EnvSource::fixed([(ENDPOINT_VAR, server.uri())]));

        reporter.send_event(&TelemetrySettings::default(), &request());

        let deadline = Instant::now() + Duration::from_secs(5);
        let received = loop {
            let received = server.received_requests().await.unwrap_or_default();
            if !received.is_empty() || Instant::now() > deadline {
                break received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        };

        assert_eq!(received.len(), 1);
        let payload: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(payload["eventType"], "test-event");
        assert_eq!(payload["deviceHash"], "device-hashed");
    }
}
