//! Resolved telemetry settings and the layered disable flag.
//!
//! Settings are resolved once at startup and passed into every dispatch.
//! Nothing here is process-global: the host owns the value.

use std::process::Command;

use tracing::{debug, warn};

use crate::env::{EnvSource, DEBUG_VAR, DISABLED_VAR, ENDPOINT_VAR};
use crate::store::PreferenceStore;

/// Compiled-in endpoint base URL.
pub const DEFAULT_ENDPOINT: &str = "https://telemetry.pennant.dev";

/// Path appended to the endpoint base for event submission.
pub const EVENT_PATH: &str = "/v1/event";

/// Preference-store key holding the user's opt-out.
pub const DISABLED_KEY: &str = "telemetry.disabled";

/// Disable signals understood by third-party tools the host embeds:
/// the web framework's telemetry and the database toolchain's update checks.
pub const DOWNSTREAM_SUPPRESSION: [(&str, &str); 2] =
    [("NEXT_TELEMETRY_DISABLED", "1"), ("CHECKPOINT_DISABLE", "1")];

/// Immutable telemetry settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// Resolved opt-out.
    pub disabled: bool,
    /// Print payloads to stderr instead of sending them.
    pub debug: bool,
    /// Endpoint base override.
    pub endpoint: Option<String>,
    /// Version string of the host tool, reported as `runtimeVersion`.
    pub runtime_version: String,
    /// Package names whose installed versions are reported.
    pub tracked_packages: Vec<String>,
    /// The host's own package, resolvable from the package-manager variable.
    pub host_package: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            disabled: false,
            debug: false,
            endpoint: None,
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            tracked_packages: Vec::new(),
            host_package: None,
        }
    }
}

impl TelemetrySettings {
    /// Resolve settings from the preference store and environment.
    ///
    /// Telemetry is disabled when either the store has
    /// `telemetry.disabled = true` or `PENNANT_TELEMETRY_DISABLED` is truthy.
    pub fn resolve(store: &PreferenceStore, env: &EnvSource) -> Self {
        let stored = store.get_bool(DISABLED_KEY).unwrap_or(false);
        let from_env = env.flag(DISABLED_VAR);
        let disabled = stored || from_env;
        debug!(stored, from_env, disabled, "resolved telemetry opt-out");

        Self {
            disabled,
            debug: env.flag(DEBUG_VAR),
            endpoint: env.non_empty(ENDPOINT_VAR),
            ..Self::default()
        }
    }

    /// Resolve from the user's store and the process environment.
    pub fn from_environment() -> Self {
        Self::load(&EnvSource::Process)
    }

    /// Resolve from the store located through `env`.
    ///
    /// An unreadable store counts as an opt-out.
    pub fn load(env: &EnvSource) -> Self {
        match PreferenceStore::open_default(env) {
            Ok(store) => Self::resolve(&store, env),
            Err(e) => {
                warn!(error = %e, "could not read preference store; telemetry disabled");
                Self {
                    disabled: true,
                    ..Self::resolve(&PreferenceStore::in_memory(), env)
                }
            }
        }
    }

    /// Version reported as `runtimeVersion`.
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }

    /// Packages looked up under `node_modules`.
    pub fn with_tracked_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Package whose version may come from `npm_package_version`.
    pub fn with_host_package(mut self, name: impl Into<String>) -> Self {
        self.host_package = Some(name.into());
        self
    }

    /// Opt-out check at dispatch time. The environment variable is read again
    /// so a late `export` still takes effect.
    pub fn is_disabled(&self, env: &EnvSource) -> bool {
        self.disabled || env.flag(DISABLED_VAR)
    }

    /// Whether payloads go to stderr instead of the network.
    pub fn is_debug(&self, env: &EnvSource) -> bool {
        self.debug || env.flag(DEBUG_VAR)
    }

    /// Full submission URL: env override, then settings, then the default.
    pub fn event_url(&self, env: &EnvSource) -> String {
        let base = env
            .non_empty(ENDPOINT_VAR)
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        format!("{}{}", base.trim().trim_end_matches('/'), EVENT_PATH)
    }

    /// Downstream disable signals to set, empty while telemetry is enabled.
    pub fn suppression_env(&self) -> &'static [(&'static str, &'static str)] {
        if self.disabled {
            &DOWNSTREAM_SUPPRESSION
        } else {
            &[]
        }
    }

    /// Pass the downstream disable signals to a child process.
    pub fn apply_to_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.envs(self.suppression_env().iter().copied())
    }

    /// Export the downstream disable signals into this process's environment.
    ///
    /// Call once at startup, before any threads are spawned.
    pub fn export_to_process(&self) {
        for (key, value) in self.suppression_env() {
            std::env::set_var(key, value);
        }
    }
}
