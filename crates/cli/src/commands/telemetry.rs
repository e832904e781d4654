use std::io::Write;
use std::path::Path;

use pennant_telemetry::env::{DISABLED_VAR, EnvSource};
use pennant_telemetry::notice::INFORMED_AT_KEY;
use pennant_telemetry::settings::DISABLED_KEY;
use pennant_telemetry::{EventRequest, PreferenceStore, TelemetryReporter, TelemetrySettings};
use tracing::info;

/// Run `telemetry status`: show whether telemetry is on and why.
pub fn status(
    store: &PreferenceStore,
    settings: &TelemetrySettings,
    env: &EnvSource,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let stored = store.get_bool(DISABLED_KEY).unwrap_or(false);
    let from_env = env.flag(DISABLED_VAR);

    writeln!(out, "Telemetry")?;
    writeln!(out, "=========")?;
    if settings.is_disabled(env) {
        writeln!(out, "Status:   disabled")?;
        if stored {
            writeln!(out, "Reason:   preference `{DISABLED_KEY}` is set")?;
        }
        if from_env {
            writeln!(out, "Reason:   {DISABLED_VAR} is set")?;
        }
    } else {
        writeln!(out, "Status:   enabled")?;
    }
    writeln!(out, "Endpoint: {}", settings.event_url(env))?;
    if settings.is_debug(env) {
        writeln!(out, "Debug:    payloads are printed, not sent")?;
    }
    match store.path() {
        Some(path) => writeln!(out, "Store:    {}", path.display())?,
        None => writeln!(out, "Store:    (none)")?,
    }
    match store.get_str(INFORMED_AT_KEY) {
        Some(at) => writeln!(out, "Notice:   shown {at}")?,
        None => writeln!(out, "Notice:   not yet shown")?,
    }
    Ok(())
}

/// Run `telemetry enable`.
pub fn enable(
    store: &mut PreferenceStore,
    env: &EnvSource,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    store.set(DISABLED_KEY, false)?;
    store.save()?;
    info!("telemetry enabled in preference store");

    writeln!(out, "Telemetry enabled. Thank you for helping improve Pennant.")?;
    if env.flag(DISABLED_VAR) {
        writeln!(
            out,
            "Note: {DISABLED_VAR} is still set in this environment and takes precedence."
        )?;
    }
    Ok(())
}

/// Run `telemetry disable`.
pub fn disable(store: &mut PreferenceStore, out: &mut impl Write) -> anyhow::Result<()> {
    store.set(DISABLED_KEY, true)?;
    store.save()?;
    info!("telemetry disabled in preference store");

    writeln!(out, "Telemetry disabled. No usage data will be collected or sent.")?;
    Ok(())
}

/// Run `telemetry reset`: forget the opt-out and the notice.
pub fn reset(store: &mut PreferenceStore, out: &mut impl Write) -> anyhow::Result<()> {
    store.remove(DISABLED_KEY);
    store.remove(INFORMED_AT_KEY);
    store.save()?;

    writeln!(out, "Telemetry preferences reset.")?;
    Ok(())
}

/// Run `telemetry preview`: print the payload a `send` would post.
/// Nothing is collected while telemetry is disabled.
pub fn preview(
    reporter: &TelemetryReporter,
    settings: &TelemetrySettings,
    env: &EnvSource,
    cwd: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if settings.is_disabled(env) {
        writeln!(out, "Telemetry is disabled; nothing would be collected or sent.")?;
        return Ok(());
    }
    let event = reporter.build_event(settings, &EventRequest::new("preview", cwd));
    writeln!(out, "{}", serde_json::to_string_pretty(&event)?)?;
    Ok(())
}
