//! Telemetry data collection: gathers the device and project fingerprints.
//!
//! Everything that could identify a person or a codebase is reduced to a
//! SHA-256 digest here, before it reaches the event model.

pub mod device;
pub mod project;

use sha2::{Digest, Sha256};

pub use device::{collect_device, resolve_locale, DeviceSource, SystemDevice};
pub use project::{collect_project, normalize_remote_url, origin_hash_from_output};

/// One-way hash used for every identifying string: lowercase hex SHA-256.
pub fn one_way_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
