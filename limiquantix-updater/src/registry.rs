//! Phase → page registry
//!
//! Pages are built from a [`PageInputs`] snapshot. A full rebuild happens
//! whenever the changelog, the update record or the build card changes;
//! progress-only changes rebuild just the affected phase.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};

use crate::events::UserAction;
use crate::page::{BackgroundAction, Button, Icon, Page, Progress, RichContent};
use crate::phase::PhaseId;
use crate::record::BuildInfo;

/// User-facing strings
pub mod text {
    pub const ERROR_TITLE: &str = "ERROR";
    pub const ERROR_STATUS: &str = "An unhandled exception has occurred";
    pub const TRY_AGAIN: &str = "Try again";
    pub const EXIT: &str = "Exit";
    pub const NO_UPDATE: &str = "No update available";
    pub const CHECK_NOW: &str = "Check for update";
    pub const CHECKING: &str = "Checking for update…";
    pub const AVAILABLE: &str = "System update available";
    pub const UPDATE_NOW: &str = "Download and install";
    pub const STARTING: &str = "Starting…";
    pub const DOWNLOADING: &str = "Downloading system update";
    pub const INSTALLING: &str = "Installing system update";
    pub const OPTIMIZING: &str = "Optimizing apps";
    pub const PAUSE: &str = "Pause";
    pub const RESUME: &str = "Resume";
    pub const CANCEL: &str = "Cancel";
    pub const DOWNLOAD_PAUSED: &str = "Download paused";
    pub const DOWNLOAD_FAILED: &str = "Download failed";
    pub const VERIFICATION_FAILED: &str = "Update verification failed";
    pub const RETRY: &str = "Retry";
    pub const UPDATE_PAUSED: &str = "Update paused";
    pub const PENDING_REBOOT: &str = "Restart your device to finish installing the update";
    pub const RESTART_NOW: &str = "Restart now";
    pub const INSTALL_FAILED: &str = "Couldn't install update";
    pub const ACKNOWLEDGE: &str = "OK";
    pub const INSTALL_LATER: &str = "The update could not be installed. Try again later.";
    pub const BATTERY_LOW: &str = "Battery too low to update. Charge your device to continue.";
    pub const ENROLL: &str = "Enroll in early releases";
    pub const ENROLL_ACCEPT: &str = "Accept";
    pub const ENROLL_REJECT: &str = "Decline";
    pub const ENROLL_TERMS: &str = "Early releases reach your device before everyone else. \
        They may contain bugs. You can leave the program at any time.";
}

/// Step label with a leading percentage, e.g. "42% • Download paused"
pub fn percent_step(percent: i32, label: &str) -> String {
    format!("{}% • {}", percent.clamp(0, 100), label)
}

/// Everything page construction may read
#[derive(Debug, Clone, Default)]
pub struct PageInputs {
    /// Rendered current-build card
    pub build_card: String,
    /// Changelog HTML for the active update
    pub changelog: String,
    pub accent: Option<u32>,
    /// Persisted progress, `-1` for indeterminate
    pub progress_percent: i32,
    pub progress_step: String,
    pub ab_device: bool,
}

impl PageInputs {
    fn content(&self, body: &str) -> RichContent {
        RichContent::new(body, self.accent)
    }

    fn changelog(&self) -> RichContent {
        self.content(&self.changelog)
    }

    fn persisted_progress(&self) -> Progress {
        Progress::from_raw(self.progress_percent, self.progress_step.clone())
    }
}

/// Render the current-build card shown on the idle page
pub fn build_card(build: &BuildInfo) -> String {
    let date = Utc
        .timestamp_opt(build.timestamp, 0)
        .single()
        .map(|dt| dt.format("%B %-d, %Y").to_string())
        .unwrap_or_default();

    format!(
        "<p style=\"font-size: 17px;\"> Version {}<br />Security patch: {}<br />Build date: {} </p>",
        build.version, build.security_patch, date
    )
}

/// Holds the current page for every phase
#[derive(Debug, Clone, Default)]
pub struct PageRegistry {
    pages: BTreeMap<PhaseId, Page>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every phase built from `inputs`
    pub fn built(inputs: &PageInputs) -> Self {
        let mut registry = Self::new();
        registry.rebuild_all(inputs);
        registry
    }

    pub fn get(&self, phase: PhaseId) -> Option<&Page> {
        self.pages.get(&phase)
    }

    /// Upsert the page for one phase
    pub fn register(&mut self, phase: PhaseId, mut page: Page) {
        page.phase = phase;
        self.pages.insert(phase, page);
    }

    /// Rebuild one phase from `inputs`
    pub fn rebuild(&mut self, phase: PhaseId, inputs: &PageInputs) {
        let page = self.build(phase, inputs);
        self.register(phase, page);
    }

    /// Regenerate every phase
    pub fn rebuild_all(&mut self, inputs: &PageInputs) {
        // ALL lists updateDownloading before the pages derived from it
        for phase in PhaseId::ALL {
            self.rebuild(phase, inputs);
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PhaseId, &Page)> {
        self.pages.iter()
    }

    /// Percent currently shown on the downloading page
    fn download_percent(&self) -> i32 {
        self.get(PhaseId::UpdateDownloading)
            .and_then(|page| page.progress.as_ref())
            .and_then(|progress| progress.percent)
            .map(i32::from)
            .unwrap_or(0)
    }

    fn build(&self, phase: PhaseId, inputs: &PageInputs) -> Page {
        match phase {
            PhaseId::Error => error_page(inputs),
            PhaseId::CheckForUpdates => check_for_updates_page(inputs),
            PhaseId::UpdateChecking => checking_page(),
            PhaseId::UpdateAvailable => available_page(inputs),
            PhaseId::UpdateStarting => starting_page(inputs),
            PhaseId::UpdateDownloading => downloading_page(inputs),
            PhaseId::UpdatePaused => paused_page(inputs, self.download_percent()),
            PhaseId::UpdateRetryDownload => {
                let base = self
                    .get(PhaseId::UpdateDownloading)
                    .cloned()
                    .unwrap_or_else(|| downloading_page(inputs));
                retry_page(base)
            }
            PhaseId::UpdateInstalling => installing_page(inputs),
            PhaseId::UpdateInstallingPaused => installing_paused_page(inputs),
            PhaseId::UpdateInstalled => installed_page(inputs),
            PhaseId::UpdateInstallFailed => install_failed_page(inputs),
            PhaseId::Enrollment => enrollment_page(inputs),
        }
    }
}

fn error_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Error),
        title: text::ERROR_TITLE.to_string(),
        status: text::ERROR_STATUS.to_string(),
        primary: Some(Button::new(text::TRY_AGAIN, UserAction::TryAgain)),
        secondary: Some(Button::new(text::EXIT, UserAction::Exit)),
        content: inputs.content(""),
        background: Some(BackgroundAction::ReportDiagnostic),
        ..Page::new(PhaseId::Error)
    }
}

fn check_for_updates_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Check),
        status: text::NO_UPDATE.to_string(),
        primary: Some(Button::new(text::CHECK_NOW, UserAction::CheckNow)),
        content: inputs.content(&inputs.build_card),
        ..Page::new(PhaseId::CheckForUpdates)
    }
}

fn checking_page() -> Page {
    Page {
        icon: Some(Icon::Loading),
        status: text::CHECKING.to_string(),
        progress: Some(Progress::from_raw(-1, "")),
        background: Some(BackgroundAction::BeginCheck),
        ..Page::new(PhaseId::UpdateChecking)
    }
}

fn available_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Download),
        status: text::AVAILABLE.to_string(),
        primary: Some(Button::new(text::UPDATE_NOW, UserAction::UpdateNow)),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdateAvailable)
    }
}

fn starting_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Download),
        status: text::STARTING.to_string(),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdateStarting)
    }
}

fn downloading_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Download),
        status: text::DOWNLOADING.to_string(),
        primary: Some(Button::new(text::PAUSE, UserAction::PauseDownload)),
        extra: Some(Button::new(text::CANCEL, UserAction::CancelDownload)),
        progress: Some(inputs.persisted_progress()),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdateDownloading)
    }
}

fn paused_page(inputs: &PageInputs, download_percent: i32) -> Page {
    Page {
        icon: Some(Icon::Download),
        status: text::DOWNLOADING.to_string(),
        primary: Some(Button::new(text::RESUME, UserAction::ResumeDownload)),
        extra: Some(Button::new(text::CANCEL, UserAction::CancelDownload)),
        progress: Some(Progress::from_raw(
            download_percent,
            percent_step(download_percent, text::DOWNLOAD_PAUSED),
        )),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdatePaused)
    }
}

fn retry_page(base: Page) -> Page {
    let percent = base
        .progress
        .as_ref()
        .and_then(|progress| progress.percent)
        .map(i32::from)
        .unwrap_or(0);

    Page {
        icon: Some(Icon::Error),
        status: text::DOWNLOAD_FAILED.to_string(),
        primary: Some(Button::new(text::RETRY, UserAction::RetryDownload)),
        progress: Some(Progress::from_raw(percent, percent_step(percent, text::RETRY))),
        background: None,
        phase: PhaseId::UpdateRetryDownload,
        ..base
    }
}

fn installing_page(inputs: &PageInputs) -> Page {
    let extra = inputs
        .ab_device
        .then(|| Button::new(text::PAUSE, UserAction::PauseInstall));

    Page {
        icon: Some(Icon::Download),
        status: text::INSTALLING.to_string(),
        extra,
        progress: Some(inputs.persisted_progress()),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdateInstalling)
    }
}

fn installing_paused_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Download),
        status: text::INSTALLING.to_string(),
        primary: Some(Button::new(text::CANCEL, UserAction::CancelInstall)),
        extra: Some(Button::new(text::RESUME, UserAction::ResumeInstall)),
        progress: Some(Progress::from_raw(inputs.progress_percent, text::UPDATE_PAUSED)),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdateInstallingPaused)
    }
}

fn installed_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Download),
        status: text::PENDING_REBOOT.to_string(),
        primary: Some(Button::new(text::RESTART_NOW, UserAction::RestartNow)),
        content: inputs.changelog(),
        ..Page::new(PhaseId::UpdateInstalled)
    }
}

fn install_failed_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Failure),
        status: text::INSTALL_FAILED.to_string(),
        primary: Some(Button::new(text::ACKNOWLEDGE, UserAction::AcknowledgeFailure)),
        content: inputs.content(text::INSTALL_LATER),
        ..Page::new(PhaseId::UpdateInstallFailed)
    }
}

fn enrollment_page(inputs: &PageInputs) -> Page {
    Page {
        icon: Some(Icon::Enroll),
        status: text::ENROLL.to_string(),
        primary: Some(Button::new(text::ENROLL_ACCEPT, UserAction::AcceptEarlyUpdates)),
        extra: Some(Button::new(text::ENROLL_REJECT, UserAction::RejectEarlyUpdates)),
        content: inputs.content(text::ENROLL_TERMS),
        ..Page::new(PhaseId::Enrollment)
    }
}
