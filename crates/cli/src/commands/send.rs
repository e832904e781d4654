use std::io::Write;
use std::path::Path;

use pennant_telemetry::notice::inform_once;
use pennant_telemetry::{
    EventRequest, PreferenceStore, SchemaSummary, TelemetryReporter, TelemetrySettings,
};
use tracing::warn;

/// Options for the `send` command.
pub struct SendArgs<'a> {
    pub event_type: &'a str,
    pub cwd: &'a Path,
    pub db_provider: Option<&'a str>,
    pub lists: Option<usize>,
    pub fields: Option<usize>,
}

impl SendArgs<'_> {
    fn request(&self) -> EventRequest {
        let mut request = EventRequest::new(self.event_type, self.cwd);
        if let Some(provider) = self.db_provider {
            request = request.with_db_provider(provider);
        }
        if let Some(lists) = self.lists {
            request = request.with_schema(SchemaSummary::new(lists, self.fields.unwrap_or(0)));
        }
        request
    }
}

/// Run the `send` command: show the first-run notice if needed, then report
/// the event. Delivery is best-effort.
pub fn run(
    args: &SendArgs<'_>,
    store: &mut PreferenceStore,
    reporter: &TelemetryReporter,
    settings: &TelemetrySettings,
    notice_out: &mut impl Write,
) -> anyhow::Result<()> {
    if let Err(e) = inform_once(store, settings, notice_out) {
        warn!("could not record telemetry notice: {e}");
    }
    reporter.send_event(settings, &args.request());
    Ok(())
}
