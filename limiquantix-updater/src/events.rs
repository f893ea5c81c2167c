//! Typed events consumed by the lifecycle controller
//!
//! Every input to the state machine is one of these closed enums and flows
//! through [`crate::controller::LifecycleController::handle`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::orchestrator::Orchestrator;
use crate::phase::PhaseId;
use crate::record::UpdateRecord;

/// Something the user pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    CheckNow,
    UpdateNow,
    PauseDownload,
    ResumeDownload,
    CancelDownload,
    RetryDownload,
    PauseInstall,
    ResumeInstall,
    CancelInstall,
    RestartNow,
    AcknowledgeFailure,
    TryAgain,
    Exit,
    AcceptEarlyUpdates,
    RejectEarlyUpdates,
    /// Tap on the header icon (seven quick taps open enrollment)
    HeaderIconTapped,
}

/// Events broadcast by the download/install service, tagged with the update id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    StatusChanged { download_id: String },
    DownloadProgress { download_id: String },
    InstallProgress { download_id: String },
    UpdateRemoved { download_id: String },
}

impl ServiceEvent {
    pub fn download_id(&self) -> &str {
        match self {
            ServiceEvent::StatusChanged { download_id }
            | ServiceEvent::DownloadProgress { download_id }
            | ServiceEvent::InstallProgress { download_id }
            | ServiceEvent::UpdateRemoved { download_id } => download_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceEvent::StatusChanged { .. } => "update_status_changed",
            ServiceEvent::DownloadProgress { .. } => "download_progress",
            ServiceEvent::InstallProgress { .. } => "install_progress",
            ServiceEvent::UpdateRemoved { .. } => "update_removed",
        }
    }
}

/// Callbacks from the low-level A/B update engine.
///
/// These fire whether or not a view is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// Writing the payload; `fraction` is 0.0..=1.0
    Downloading { fraction: f32 },
    /// Post-install optimisation; `fraction` is 0.0..=1.0
    Finalizing { fraction: f32 },
    UpdatedNeedReboot,
    PayloadApplied { success: bool },
}

/// Result of one update check, produced on a worker task
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Available {
        record: UpdateRecord,
        /// Raw changelog HTML fetched from the record's changelog URL
        changelog: String,
    },
    UpToDate,
    Failed(String),
}

/// Everything the UI context can be asked to process
pub enum UiEvent {
    /// Resolve and show the cold-start phase
    Start,
    User(UserAction),
    Service(ServiceEvent),
    Engine(EngineEvent),
    CheckFinished(CheckOutcome),
    ServiceBound(Arc<dyn Orchestrator>),
    ServiceLost,
    /// Fired by the resolve debounce timer
    ResolveFallback,
    /// Fired by the battery poll timer
    BatteryPoll,
    /// Fired by the periodic auto-check timer
    ScheduledCheck,
    /// Progress produced by a worker for a specific phase
    Progress {
        phase: PhaseId,
        percent: i32,
        step: String,
    },
    /// Flush state and leave the UI loop
    Stop,
}

impl UiEvent {
    /// Short name for log lines
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::Start => "start",
            UiEvent::User(_) => "user",
            UiEvent::Service(event) => event.kind(),
            UiEvent::Engine(_) => "engine",
            UiEvent::CheckFinished(_) => "check_finished",
            UiEvent::ServiceBound(_) => "service_bound",
            UiEvent::ServiceLost => "service_lost",
            UiEvent::ResolveFallback => "resolve_fallback",
            UiEvent::BatteryPoll => "battery_poll",
            UiEvent::ScheduledCheck => "scheduled_check",
            UiEvent::Progress { .. } => "progress",
            UiEvent::Stop => "stop",
        }
    }
}

impl std::fmt::Debug for UiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiEvent::User(action) => write!(f, "User({:?})", action),
            UiEvent::Service(event) => write!(f, "Service({:?})", event),
            UiEvent::Engine(event) => write!(f, "Engine({:?})", event),
            UiEvent::CheckFinished(outcome) => write!(f, "CheckFinished({:?})", outcome),
            UiEvent::Progress { phase, percent, step } => {
                write!(f, "Progress({}, {}, {:?})", phase, percent, step)
            }
            other => f.write_str(other.name()),
        }
    }
}
