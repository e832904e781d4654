//! Project fingerprint: hashed git origin and working directory, tracked
//! package versions, and schema aggregates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::one_way_hash;
use crate::env::{EnvSource, PACKAGE_VERSION_VAR};
use crate::error::{Result, TelemetryError};
use crate::models::{ProjectInfo, SchemaSummary};
use crate::settings::TelemetrySettings;

const URL_SCHEMES: [&str; 5] = ["https://", "http://", "ssh://", "git+ssh://", "git://"];

/// Assemble project facts for `cwd`.
pub fn collect_project(
    cwd: &Path,
    schema: Option<&SchemaSummary>,
    settings: &TelemetrySettings,
    env: &EnvSource,
) -> ProjectInfo {
    ProjectInfo {
        git_origin_hash: git_origin_hash(cwd),
        cwd_hash: cwd_hash(cwd),
        list_count: schema.map(|s| s.list_count),
        field_count: schema.map(|s| s.field_count),
        packages: package_versions(cwd, settings, env),
    }
}

/// Hash of the repository's origin remote, or `None` outside a repository
/// or without an origin.
pub fn git_origin_hash(cwd: &Path) -> Option<String> {
    match read_git_origin(cwd) {
        Ok(raw) => origin_hash_from_output(&raw),
        Err(e) => {
            debug!(error = %e, "no git origin");
            None
        }
    }
}

fn read_git_origin(cwd: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["config", "--local", "--get", "remote.origin.url"])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Err(TelemetryError::Git(format!(
            "git config exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Hash raw `git config` output. Empty output yields `None`.
pub fn origin_hash_from_output(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    Some(one_way_hash(&normalize_remote_url(url)))
}

/// Reduce a remote URL to `host/path`.
///
/// `git@github.com:org/repo.git`, `https://github.com/org/repo.git`,
/// `http://github.com/org/repo.git` and `https://user@github.com/org/repo.git`
/// all become `github.com/org/repo.git`.
pub fn normalize_remote_url(url: &str) -> String {
    let mut rest = url.trim();
    let mut has_scheme = false;
    for scheme in URL_SCHEMES {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            has_scheme = true;
            break;
        }
    }

    // Credentials sit before the first '/'.
    let authority_end = rest.find('/').unwrap_or(rest.len());
    if let Some(at) = rest[..authority_end].rfind('@') {
        rest = &rest[at + 1..];
    }

    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);
    match authority.split_once(':') {
        // scp-like `host:org/repo`
        Some((host, tail)) if !has_scheme => {
            if tail.is_empty() {
                format!("{host}{path}")
            } else {
                format!("{host}/{tail}{path}")
            }
        }
        // `host:port` in a URL
        Some((host, _port)) => format!("{host}{path}"),
        None => rest.to_string(),
    }
}

/// SHA-256 of the absolute working-directory path.
pub fn cwd_hash(cwd: &Path) -> String {
    one_way_hash(&absolute(cwd).to_string_lossy())
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Installed versions of the tracked packages.
///
/// Each package is looked up in `<cwd>/node_modules/<name>/package.json`.
/// The host package falls back to the package manager's injected version
/// variable. Anything unresolved is left out.
pub fn package_versions(
    cwd: &Path,
    settings: &TelemetrySettings,
    env: &EnvSource,
) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    for name in &settings.tracked_packages {
        if let Some(version) = installed_version(cwd, name) {
            versions.insert(name.clone(), version);
        }
    }

    if let Some(host) = &settings.host_package {
        if !versions.contains_key(host) {
            if let Some(version) = env.non_empty(PACKAGE_VERSION_VAR) {
                versions.insert(host.clone(), version.trim().to_string());
            }
        }
    }
    versions
}

fn installed_version(cwd: &Path, package: &str) -> Option<String> {
    let manifest = cwd.join("node_modules").join(package).join("package.json");
    let content = std::fs::read_to_string(manifest).ok()?;
    let json: serde_json::Value = serde_json::from_str(&content).ok()?;
    json.get("version")?.as_str().map(str::to_string)
}
