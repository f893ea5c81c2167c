//! Collaborator contracts
//!
//! The download service, the installers, the update server and the device
//! itself live outside this crate. The controller only talks to them through
//! these traits.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::record::{BuildInfo, UpdateRecord};

/// The background service that owns the single active update.
///
/// It outlives any UI attachment. Queries are cheap and synchronous; commands
/// are fire-and-forget requests whose outcome arrives later as a
/// [`crate::events::ServiceEvent`].
pub trait Orchestrator: Send + Sync {
    /// Current view of a known update
    fn get_update(&self, download_id: &str) -> Option<UpdateRecord>;

    /// Make an update known to the service, replacing any previous one
    fn add_update(&self, record: UpdateRecord);

    fn is_downloading(&self, download_id: &str) -> bool;
    fn is_verifying(&self, download_id: &str) -> bool;
    fn is_installing(&self, download_id: &str) -> bool;
    fn is_waiting_for_reboot(&self, download_id: &str) -> bool;

    /// Whether the running install uses the A/B engine
    fn is_installing_ab(&self) -> bool;

    fn has_active_downloads(&self) -> bool;

    fn start_download(&self, download_id: &str) -> Result<()>;
    fn pause_download(&self, download_id: &str) -> Result<()>;
    fn resume_download(&self, download_id: &str) -> Result<()>;

    /// Delete the artifact and forget the update
    fn delete_update(&self, download_id: &str) -> Result<()>;

    fn trigger_install(&self, download_id: &str) -> Result<()>;
    fn cancel_install(&self) -> Result<()>;
    fn suspend_install(&self) -> Result<()>;
    fn resume_install(&self) -> Result<()>;
}

/// What the service reports about one update right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroundTruth {
    pub downloading: bool,
    pub verifying: bool,
    pub installing: bool,
    pub waiting_for_reboot: bool,
}

impl GroundTruth {
    /// Probe the service for `download_id`
    pub fn probe(orchestrator: &dyn Orchestrator, download_id: &str) -> Self {
        Self {
            downloading: orchestrator.is_downloading(download_id),
            verifying: orchestrator.is_verifying(download_id),
            installing: orchestrator.is_installing(download_id),
            waiting_for_reboot: orchestrator.is_waiting_for_reboot(download_id),
        }
    }

    /// True when any download, verification, install or pending reboot is known
    pub fn is_busy(&self) -> bool {
        self.downloading || self.verifying || self.installing || self.waiting_for_reboot
    }
}

/// Request sent to the update server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRequest {
    pub build: BuildInfo,
    /// Hardware id, `"0"` unless the user opted into early updates
    pub hw_id: String,
}

/// Update server client
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// Ask for the newest update for this build. `Ok(None)` means none offered.
    async fn check(&self, request: &CheckRequest) -> Result<Option<UpdateRecord>>;

    /// Fetch the changelog HTML for a record
    async fn fetch_changelog(&self, url: &str) -> Result<String>;
}

/// Device facilities the lifecycle needs
pub trait Platform: Send + Sync {
    /// Whether the battery allows starting a download
    fn battery_ok(&self) -> bool;

    fn reboot(&self) -> Result<()>;
}

/// Platform for devices without a battery that never reboot on request
#[derive(Debug, Default, Clone, Copy)]
pub struct MainsPowered;

impl Platform for MainsPowered {
    fn battery_ok(&self) -> bool {
        true
    }

    fn reboot(&self) -> Result<()> {
        anyhow::bail!("Reboot is not supported on this platform")
    }
}
