//! Lifecycle phase identifiers

use serde::{Deserialize, Serialize};

use crate::error::UpdaterError;

/// One discrete state of the update lifecycle UI.
///
/// The string form (`as_str`) is what gets persisted under `pageId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseId {
    Error,
    CheckForUpdates,
    UpdateChecking,
    UpdateAvailable,
    UpdateStarting,
    UpdateDownloading,
    UpdatePaused,
    UpdateRetryDownload,
    UpdateInstalling,
    UpdateInstallingPaused,
    UpdateInstalled,
    UpdateInstallFailed,
    Enrollment,
}

impl PhaseId {
    /// Every well-known phase, in registry order
    pub const ALL: [PhaseId; 13] = [
        PhaseId::Error,
        PhaseId::CheckForUpdates,
        PhaseId::UpdateChecking,
        PhaseId::UpdateAvailable,
        PhaseId::UpdateStarting,
        PhaseId::UpdateDownloading,
        PhaseId::UpdatePaused,
        PhaseId::UpdateRetryDownload,
        PhaseId::UpdateInstalling,
        PhaseId::UpdateInstallingPaused,
        PhaseId::UpdateInstalled,
        PhaseId::UpdateInstallFailed,
        PhaseId::Enrollment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseId::Error => "error",
            PhaseId::CheckForUpdates => "checkForUpdates",
            PhaseId::UpdateChecking => "updateChecking",
            PhaseId::UpdateAvailable => "updateAvailable",
            PhaseId::UpdateStarting => "updateStarting",
            PhaseId::UpdateDownloading => "updateDownloading",
            PhaseId::UpdatePaused => "updatePaused",
            PhaseId::UpdateRetryDownload => "updateRetryDownload",
            PhaseId::UpdateInstalling => "updateInstalling",
            PhaseId::UpdateInstallingPaused => "updateInstallingPaused",
            PhaseId::UpdateInstalled => "updateInstalled",
            PhaseId::UpdateInstallFailed => "updateInstallFailed",
            PhaseId::Enrollment => "enrollment",
        }
    }

    /// Phases that are always recomputed on restart and never persisted
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PhaseId::Error
                | PhaseId::CheckForUpdates
                | PhaseId::UpdateAvailable
                | PhaseId::UpdateChecking
                | PhaseId::Enrollment
        )
    }

    /// Phases that are only valid while the installer is really running
    /// (or has finished and waits for reboot)
    pub fn requires_install_ground_truth(&self) -> bool {
        matches!(
            self,
            PhaseId::UpdateInstalling | PhaseId::UpdateInstallingPaused | PhaseId::UpdateInstalled
        )
    }

    /// Phases that end the current cycle and wait for the user
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseId::UpdateInstalled | PhaseId::UpdateInstallFailed)
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseId {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseId::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UpdaterError::UnknownPhase(s.to_string()))
    }
}
