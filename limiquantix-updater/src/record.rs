//! Update record and build information
//!
//! Provides the data describing one candidate update and the currently
//! running build it is compared against.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Status of an update as reported by the download/install service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Nothing reported yet
    #[default]
    Unknown,

    /// Download requested, transfer not yet running
    Starting,

    /// Transferring the artifact
    Downloading,

    /// Paused by the user
    Paused,

    /// Paused because the transfer failed
    PausedError,

    /// Artifact did not pass verification
    VerificationFailed,

    /// Artifact verified and ready to install
    Verified,

    /// Installer is running
    Installing,

    /// Installer reported a failure
    InstallationFailed,

    /// Installed, waiting for reboot
    Installed,

    /// Artifact was released
    Deleted,
}

impl UpdateStatus {
    /// Check if this status represents an error
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            UpdateStatus::PausedError
                | UpdateStatus::VerificationFailed
                | UpdateStatus::InstallationFailed
        )
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateStatus::Unknown => "unknown",
            UpdateStatus::Starting => "starting",
            UpdateStatus::Downloading => "downloading",
            UpdateStatus::Paused => "paused",
            UpdateStatus::PausedError => "paused_error",
            UpdateStatus::VerificationFailed => "verification_failed",
            UpdateStatus::Verified => "verified",
            UpdateStatus::Installing => "installing",
            UpdateStatus::InstallationFailed => "installation_failed",
            UpdateStatus::Installed => "installed",
            UpdateStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// Payload layout of the update artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtaType {
    #[default]
    Unknown,
    /// Streamed into the inactive slot of an A/B device
    Ab,
    /// Applied by recovery on reboot
    Block,
}

/// One candidate update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Stable identifier of the artifact
    pub download_id: String,

    /// Display name, usually the original file name
    #[serde(default)]
    pub name: String,

    /// Build version string of the update
    #[serde(default)]
    pub version: String,

    /// Build date of the update (seconds since epoch)
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default)]
    pub ota_type: OtaType,

    #[serde(default)]
    pub status: UpdateStatus,

    /// Download percentage (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Install percentage (0-100)
    #[serde(default)]
    pub install_progress: u8,

    /// Installer is in its finalizing step
    #[serde(default)]
    pub finalizing: bool,

    /// Artifact size in bytes
    #[serde(default)]
    pub file_size: u64,

    #[serde(default)]
    pub download_url: String,

    #[serde(default)]
    pub changelog_url: String,

    /// Where the downloaded artifact lives, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<PathBuf>,
}

impl UpdateRecord {
    /// Create a record with the given id
    pub fn new(download_id: impl Into<String>) -> Self {
        Self {
            download_id: download_id.into(),
            ..Default::default()
        }
    }

    /// Encode for the `update` key of the state store
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Decode a value written by [`UpdateRecord::encode`]
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Check whether this update is newer than the running build
    pub fn is_newer_than(&self, build: &BuildInfo) -> bool {
        self.timestamp > build.timestamp
    }
}

/// The build currently running on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInfo {
    /// Device code name
    pub device: String,

    /// Full build fingerprint
    pub fingerprint: String,

    /// Release version (e.g. "14")
    pub version: String,

    /// Incremental build number
    pub incremental: u64,

    /// Build date (seconds since epoch)
    pub timestamp: i64,

    /// Security patch level (YYYY-MM-DD)
    pub security_patch: String,

    pub sdk_level: String,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            device: "quantix".to_string(),
            fingerprint: String::new(),
            version: "0.0.1".to_string(),
            incremental: 0,
            timestamp: 0,
            security_patch: String::new(),
            sdk_level: String::new(),
        }
    }
}

/// Format a byte count the way the changelog footer shows it
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else if value < 10.0 {
        format!("{:.2} {}", value, UNITS[unit])
    } else if value < 100.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}
