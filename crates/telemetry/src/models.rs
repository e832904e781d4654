//! Telemetry data models: the event payload and its parts.
//!
//! Wire contract (`POST /v1/event`, JSON, camelCase):
//! `deviceHash, os, osVersion, runtimeVersion, locale, gitOriginHash,
//! cwdHash, listCount, fieldCount, packages, eventType, dbProvider`.
//! Identifying strings (paths, remote URLs, machine ids) only ever appear
//! as SHA-256 digests.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Facts about the machine running the host tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Machine identifier, already hashed by its source.
    pub device_hash: Option<String>,
    /// Platform name (e.g. "linux").
    pub os: String,
    /// OS release version.
    pub os_version: Option<String>,
    /// Version of the host tool.
    pub runtime_version: String,
    /// Locale without encoding suffix (e.g. "en_AU").
    pub locale: Option<String>,
}

/// Hashed and aggregated facts about the project the tool ran in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    /// SHA-256 of the normalized `remote.origin.url`.
    pub git_origin_hash: Option<String>,
    /// SHA-256 of the absolute working directory.
    pub cwd_hash: String,
    /// Number of declared lists, when a schema was supplied.
    pub list_count: Option<usize>,
    /// Total declared fields across lists, when a schema was supplied.
    pub field_count: Option<usize>,
    /// Installed versions of tracked packages. Missing packages are omitted.
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
}

/// Aggregate view of a project's data model. Carries counts only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaSummary {
    /// Number of lists in the schema.
    pub list_count: usize,
    /// Fields summed over all lists.
    pub field_count: usize,
}

impl SchemaSummary {
    /// Totals supplied directly.
    pub fn new(list_count: usize, field_count: usize) -> Self {
        Self {
            list_count,
            field_count,
        }
    }

    /// Reduce `(list name, field count)` pairs to totals. Names are dropped.
    pub fn from_lists<I, S>(lists: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
    {
        lists
            .into_iter()
            .fold(Self::default(), |acc, (_, fields)| Self {
                list_count: acc.list_count + 1,
                field_count: acc.field_count + fields,
            })
    }
}

/// One telemetry event as sent on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    #[serde(flatten)]
    pub device: DeviceInfo,
    #[serde(flatten)]
    pub project: ProjectInfo,
    /// CLI action that triggered the event (e.g. "dev", "build").
    pub event_type: String,
    /// Database provider label supplied by the caller.
    pub db_provider: Option<String>,
}

/// What the caller knows when it reports an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    /// Reported as `eventType`.
    pub event_type: String,
    /// Project directory; only its hash leaves the process.
    pub cwd: PathBuf,
    /// Reported as `dbProvider`.
    pub db_provider: Option<String>,
    /// Source of `listCount` and `fieldCount`.
    pub schema: Option<SchemaSummary>,
}

impl EventRequest {
    /// An event of `event_type` for the project at `cwd`.
    pub fn new(event_type: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            event_type: event_type.into(),
            cwd: cwd.into(),
            db_provider: None,
            schema: None,
        }
    }

    /// Attach the database provider label.
    pub fn with_db_provider(mut self, provider: impl Into<String>) -> Self {
        self.db_provider = Some(provider.into());
        self
    }

    /// Attach schema aggregates.
    pub fn with_schema(mut self, schema: SchemaSummary) -> Self {
        self.schema = Some(schema);
        self
    }
}
