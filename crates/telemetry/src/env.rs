//! Environment variable access.
//!
//! Every environment read in this crate goes through [`EnvSource`] so tests
//! can supply a fixed map instead of mutating the process environment.

use std::collections::HashMap;

/// Truthy value disables all collection and dispatch.
pub const DISABLED_VAR: &str = "PENNANT_TELEMETRY_DISABLED";
/// Replaces the compiled-in endpoint base URL.
pub const ENDPOINT_VAR: &str = "PENNANT_TELEMETRY_ENDPOINT";
/// Truthy value routes the payload to stderr instead of the network.
pub const DEBUG_VAR: &str = "PENNANT_TELEMETRY_DEBUG";
/// Overrides the directory holding the preference store.
pub const CONFIG_DIR_VAR: &str = "PENNANT_CONFIG_DIR";
/// Injected by npm/yarn/pnpm when the host runs as a package script.
pub const PACKAGE_VERSION_VAR: &str = "npm_package_version";

/// Locale variables, highest precedence first.
pub const LOCALE_VARS: [&str; 4] = ["LC_ALL", "LC_MESSAGES", "LANG", "LANGUAGE"];

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The real process environment.
    #[default]
    Process,
    /// A fixed snapshot.
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    /// Build a fixed source from key/value pairs.
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// A source with no variables set.
    pub fn empty() -> Self {
        Self::Fixed(HashMap::new())
    }

    /// Read a variable. Non-UTF-8 values are treated as unset.
    pub fn var(&self, key: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(key).ok(),
            Self::Fixed(vars) => vars.get(key).cloned(),
        }
    }

    /// Read a variable, treating empty or whitespace-only values as unset.
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.trim().is_empty())
    }

    /// Whether a variable holds a truthy value.
    pub fn flag(&self, key: &str) -> bool {
        self.var(key).as_deref().is_some_and(is_truthy)
    }
}

/// `1`, `true`, `yes` and `on` (case-insensitive) are truthy.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
