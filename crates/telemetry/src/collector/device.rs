//! Device fingerprint: hashed machine id, OS facts, runtime version, locale.

use sysinfo::System;

use super::one_way_hash;
use crate::env::{EnvSource, LOCALE_VARS};
use crate::models::DeviceInfo;

/// Source of machine-level facts.
///
/// `device_hash` must return an identifier that has already been passed
/// through a one-way hash; callers never see the raw machine id.
pub trait DeviceSource: Send + Sync {
    fn device_hash(&self) -> Option<String>;
    fn os(&self) -> String;
    fn os_version(&self) -> Option<String>;
}

/// Reads the real machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDevice;

impl DeviceSource for SystemDevice {
    fn device_hash(&self) -> Option<String> {
        machine_id().map(|id| one_way_hash(&id))
    }

    fn os(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn os_version(&self) -> Option<String> {
        System::os_version()
    }
}

/// Assemble device facts. The identifier from `source` is used as-is.
pub fn collect_device(
    source: &dyn DeviceSource,
    env: &EnvSource,
    runtime_version: &str,
) -> DeviceInfo {
    DeviceInfo {
        device_hash: source.device_hash(),
        os: source.os(),
        os_version: source.os_version(),
        runtime_version: runtime_version.to_string(),
        locale: resolve_locale(env),
    }
}

/// First non-empty of `LC_ALL`, `LC_MESSAGES`, `LANG`, `LANGUAGE`, with any
/// `.encoding` suffix removed (`en_AU.UTF8` becomes `en_AU`).
pub fn resolve_locale(env: &EnvSource) -> Option<String> {
    let raw = LOCALE_VARS.iter().find_map(|key| env.non_empty(key))?;
    let raw = raw.trim();
    match raw.split('.').next() {
        Some(stripped) if !stripped.is_empty() => Some(stripped.to_string()),
        _ => Some(raw.to_string()),
    }
}

#[cfg(target_os = "linux")]
fn machine_id() -> Option<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty())
}

#[cfg(target_os = "macos")]
fn machine_id() -> Option<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('=').nth(1))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(target_os = "windows")]
fn machine_id() -> Option<String> {
    let output = std::process::Command::new("reg")
        .args([
            "query",
            r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
        ])
        .output()
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find(|line| line.contains("MachineGuid"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

#[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
fn machine_id() -> Option<String> {
    std::fs::read_to_string("/etc/hostid")
        .ok()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "windows",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
)))]
fn machine_id() -> Option<String> {
    None
}
