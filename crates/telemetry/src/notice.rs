//! One-time notice shown before the first telemetry event.

use std::io::Write;

use chrono::Utc;
use tracing::debug;

use crate::error::Result;
use crate::settings::TelemetrySettings;
use crate::store::PreferenceStore;

/// Preference-store key recording when the notice was shown.
pub const INFORMED_AT_KEY: &str = "telemetry.informed_at";

pub const NOTICE: &str = "\
Pennant collects anonymous usage telemetry to help prioritize development.
Sent: the command name, OS, locale, tool and package versions, schema counts,
and one-way hashes of this machine, the project path and its git remote.
Never sent: file contents, paths, remote URLs, or anything you typed.

Opt out with `pennant telemetry disable` or PENNANT_TELEMETRY_DISABLED=1.";

/// Print [`NOTICE`] to `out` unless it was already shown or telemetry is
/// disabled. Returns whether it was printed.
pub fn inform_once(
    store: &mut PreferenceStore,
    settings: &TelemetrySettings,
    out: &mut impl Write,
) -> Result<bool> {
    if settings.disabled || store.get(INFORMED_AT_KEY).is_some() {
        return Ok(false);
    }

    writeln!(out, "{NOTICE}")?;
    writeln!(out)?;
    store.set(INFORMED_AT_KEY, Utc::now().to_rfc3339())?;
    if store.path().is_some() {
        store.save()?;
    }
    debug!("displayed telemetry notice");
    Ok(true)
}
