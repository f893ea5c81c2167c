//! Update lifecycle state machine
//!
//! [`LifecycleController`] owns the page registry, the persisted state, the
//! render gateway and the collaborator handles. Every input arrives as a
//! [`UiEvent`] through [`LifecycleController::handle`]; work that has to
//! happen off the UI loop (update checks, timers) is queued as [`Work`] and
//! drained by the runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use crate::events::{CheckOutcome, EngineEvent, ServiceEvent, UiEvent, UserAction};
use crate::gateway::{RenderContext, RenderGateway, Shown};
use crate::orchestrator::{CheckRequest, GroundTruth, Orchestrator, Platform};
use crate::page::{BackgroundAction, Progress};
use crate::phase::PhaseId;
use crate::record::{format_file_size, UpdateRecord, UpdateStatus};
use crate::registry::{build_card, percent_step, text, PageInputs, PageRegistry};
use crate::store::{EarlyUpdates, PersistedState};
use crate::view::View;

/// Header taps needed to open enrollment
const TAPS_TO_ENROLL: u32 = 7;

/// Maximum gap between two counted taps
const TAP_WINDOW: Duration = Duration::from_secs(1);

/// Work the UI loop must run outside the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Work {
    /// Ask the update server, then post `CheckFinished`
    Check(CheckRequest),
    /// Post `ResolveFallback` after the delay
    ResolveAfter(Duration),
    /// Post `BatteryPoll` after the delay
    PollBattery(Duration),
}

#[derive(Debug, Default)]
struct TapCounter {
    count: u32,
    last: Option<Instant>,
}

impl TapCounter {
    /// Count a tap; true once the streak is long enough
    fn tap(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) <= TAP_WINDOW => self.count += 1,
            _ => self.count = 1,
        }
        self.last = Some(now);

        if self.count >= TAPS_TO_ENROLL {
            *self = Self::default();
            true
        } else {
            false
        }
    }
}

/// Append the download size to a fetched changelog
pub fn compose_changelog(changelog: &str, file_size: u64) -> String {
    format!(
        "{}<br /><br />Update size: {}",
        changelog,
        format_file_size(file_size)
    )
}

pub struct LifecycleController {
    config: UpdaterConfig,
    registry: PageRegistry,
    state: PersistedState,
    gateway: RenderGateway,
    orchestrator: Option<Arc<dyn Orchestrator>>,
    platform: Box<dyn Platform>,
    record: Option<UpdateRecord>,
    /// An install ran or is running in this process, so install phases
    /// are shown without consulting the service
    installing: bool,
    /// A download is held back until the battery recovers
    battery_hold: bool,
    taps: TapCounter,
    pending: Vec<Work>,
    started: bool,
    stopped: bool,
    exit_requested: bool,
}

impl LifecycleController {
    pub fn new(config: UpdaterConfig, state: PersistedState, platform: Box<dyn Platform>) -> Self {
        let record = state.update_record();
        if let Some(record) = &record {
            debug!(download_id = %record.download_id, "Restored saved update");
        }

        let mut controller = Self {
            config,
            registry: PageRegistry::new(),
            state,
            gateway: RenderGateway::new(),
            orchestrator: None,
            platform,
            record,
            installing: false,
            battery_hold: false,
            taps: TapCounter::default(),
            pending: Vec::new(),
            started: false,
            stopped: false,
            exit_requested: false,
        };
        controller.rebuild_all();
        controller
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn active_phase(&self) -> Option<PhaseId> {
        self.gateway.active()
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn gateway(&self) -> &RenderGateway {
        &self.gateway
    }

    pub fn record(&self) -> Option<&UpdateRecord> {
        self.record.as_ref()
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn is_installing(&self) -> bool {
        self.installing
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drain queued work
    pub fn take_work(&mut self) -> Vec<Work> {
        std::mem::take(&mut self.pending)
    }

    // ========================================================================
    // Attachment
    // ========================================================================

    /// Attach a view and redraw the active phase on it
    pub fn attach_view(&mut self, view: Box<dyn View>) {
        self.gateway.attach_view(view);
        if let Some(phase) = self.gateway.active() {
            self.show(phase);
        }
    }

    pub fn detach_view(&mut self) -> Option<Box<dyn View>> {
        self.gateway.detach_view()
    }

    /// Bind the background service and re-derive the phase from it
    pub fn attach_orchestrator(&mut self, orchestrator: Arc<dyn Orchestrator>) {
        info!("Update service bound");

        if let Some(record) = &self.record {
            if orchestrator.get_update(&record.download_id).is_none() {
                debug!(download_id = %record.download_id, "Registering saved update with service");
                orchestrator.add_update(record.clone());
            }
        }
        self.orchestrator = Some(orchestrator);

        if !self.started {
            return;
        }

        if let Some(phase) = self.resolve_from_service() {
            self.show(phase);
        } else if let Some(active) = self.gateway.active() {
            if active.requires_install_ground_truth() {
                // Now that ground truth is available, re-check the resumed phase
                self.show(active);
            }
        }
    }

    pub fn detach_orchestrator(&mut self) {
        if self.orchestrator.take().is_some() {
            warn!("Update service connection lost");
        }
    }

    // ========================================================================
    // Event dispatch
    // ========================================================================

    /// Apply one event
    pub fn handle(&mut self, event: UiEvent) {
        debug!(event = event.name(), active = ?self.active_phase(), "Handling event");

        match event {
            UiEvent::Start => self.start(),
            UiEvent::User(action) => self.on_user_action(action),
            UiEvent::Service(event) => self.on_service_event(event),
            UiEvent::Engine(event) => self.on_engine_event(event),
            UiEvent::CheckFinished(outcome) => self.on_check_finished(outcome),
            UiEvent::ServiceBound(orchestrator) => self.attach_orchestrator(orchestrator),
            UiEvent::ServiceLost => self.detach_orchestrator(),
            UiEvent::ResolveFallback => self.on_resolve_fallback(),
            UiEvent::BatteryPoll => self.on_battery_poll(),
            UiEvent::ScheduledCheck => self.on_scheduled_check(),
            UiEvent::Progress {
                phase,
                percent,
                step,
            } => self.set_progress(phase, percent, &step),
            UiEvent::Stop => self.shutdown(),
        }
    }

    /// Flush persisted state before the UI loop stops
    pub fn shutdown(&mut self) {
        info!("Stopping update lifecycle");
        self.state.flush();
        self.stopped = true;
    }

    // ========================================================================
    // Start-up
    // ========================================================================

    /// Phase to resume on cold start
    pub fn initial_phase(&self) -> Result<PhaseId> {
        resolve_stored_phase(&self.state.page_id(), self.state.was_updating())
    }

    fn start(&mut self) {
        self.started = true;

        let initial = match self.initial_phase() {
            Ok(phase) => phase,
            Err(e) => {
                self.show_error(&e.to_string());
                return;
            }
        };
        info!(phase = %initial, "Resolved cold-start phase");

        if self.orchestrator.is_some() {
            if let Some(phase) = self.resolve_from_service() {
                self.show(phase);
                return;
            }
        }

        if initial == PhaseId::UpdateChecking {
            // Give the service a moment to report before checking afresh
            self.pending
                .push(Work::ResolveAfter(self.config.resolve_debounce_duration()));
        } else {
            self.show(initial);
        }
    }

    /// Phase implied by what the service is doing right now
    fn resolve_from_service(&mut self) -> Option<PhaseId> {
        let orchestrator = self.orchestrator.clone()?;
        let download_id = self.record.as_ref()?.download_id.clone();
        let truth = GroundTruth::probe(orchestrator.as_ref(), &download_id);
        let status = orchestrator
            .get_update(&download_id)
            .map(|update| update.status)
            .unwrap_or_default();

        let phase = if truth.waiting_for_reboot {
            PhaseId::UpdateInstalled
        } else if truth.installing || truth.verifying {
            self.installing = true;
            if self.state.page_id() == PhaseId::UpdateInstallingPaused.as_str() {
                PhaseId::UpdateInstallingPaused
            } else {
                PhaseId::UpdateInstalling
            }
        } else if truth.downloading {
            PhaseId::UpdateDownloading
        } else if status == UpdateStatus::Starting {
            PhaseId::UpdateStarting
        } else {
            return None;
        };

        debug!(download_id = %download_id, phase = %phase, "Phase resolved from service");
        Some(phase)
    }

    fn on_resolve_fallback(&mut self) {
        if self.gateway.active().is_none() {
            self.show(PhaseId::UpdateChecking);
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn inputs(&self) -> PageInputs {
        PageInputs {
            build_card: build_card(&self.config.build),
            changelog: self.state.changelog(),
            accent: self.config.accent_rgb(),
            progress_percent: self.state.progress_percent(),
            progress_step: self.state.progress_step(),
            ab_device: self.config.ab_device,
        }
    }

    fn rebuild_all(&mut self) {
        let inputs = self.inputs();
        self.registry.rebuild_all(&inputs);
    }

    fn rebuild(&mut self, phase: PhaseId) {
        let inputs = self.inputs();
        self.registry.rebuild(phase, &inputs);
    }

    fn ground_truth(&self) -> Option<GroundTruth> {
        let orchestrator = self.orchestrator.as_ref()?;
        let download_id = self
            .record
            .as_ref()
            .map(|r| r.download_id.as_str())
            .unwrap_or_default();
        Some(GroundTruth::probe(orchestrator.as_ref(), download_id))
    }

    /// Request `phase` through the gateway
    pub fn show(&mut self, phase: PhaseId) -> PhaseId {
        let ground_truth = self.ground_truth();
        let shown = self.gateway.show(
            phase,
            RenderContext {
                registry: &self.registry,
                state: &mut self.state,
                ground_truth,
                installing: self.installing,
            },
        );
        self.after_show(shown)
    }

    /// Render the `error` phase with `diagnostic`
    pub fn show_error(&mut self, diagnostic: &str) -> PhaseId {
        let ground_truth = self.ground_truth();
        let shown = self.gateway.show_error(
            diagnostic,
            RenderContext {
                registry: &self.registry,
                state: &mut self.state,
                ground_truth,
                installing: self.installing,
            },
        );
        self.after_show(shown)
    }

    fn after_show(&mut self, shown: Shown) -> PhaseId {
        if let Some(action) = shown.background {
            self.run_background(action);
        }
        shown.phase
    }

    fn run_background(&mut self, action: BackgroundAction) {
        match action {
            BackgroundAction::BeginCheck => {
                let request = self.check_request();
                info!(device = %request.build.device, "Checking for updates");
                self.pending.push(Work::Check(request));
            }
            BackgroundAction::ReportDiagnostic => {
                error!(
                    diagnostic = self.gateway.diagnostic().unwrap_or_default(),
                    "Update lifecycle entered the error phase"
                );
            }
        }
    }

    /// Update the progress of `phase`, persist it and show the phase
    pub fn set_progress(&mut self, phase: PhaseId, percent: i32, step: &str) {
        if let Some(page) = self.registry.get(phase) {
            let mut page = page.clone();
            page.progress = Some(Progress::from_raw(percent, step));
            self.registry.register(phase, page);
        }
        self.state.set_progress(percent, step);
        self.show(phase);
    }

    // ========================================================================
    // Collaborator helpers
    // ========================================================================

    fn service(&self, needed_for: &'static str) -> Result<Arc<dyn Orchestrator>> {
        self.orchestrator
            .clone()
            .ok_or(UpdaterError::ServiceUnavailable(needed_for))
    }

    fn active_id(&self, needed_for: &'static str) -> Result<String> {
        self.record
            .as_ref()
            .map(|r| r.download_id.clone())
            .ok_or(UpdaterError::NoActiveUpdate(needed_for))
    }

    /// Request for the update server
    pub fn check_request(&self) -> CheckRequest {
        let hw_id = match self.state.early_updates() {
            EarlyUpdates::Accepted if !self.config.hw_id.is_empty() => self.config.hw_id.clone(),
            _ => "0".to_string(),
        };
        CheckRequest {
            build: self.config.build.clone(),
            hw_id,
        }
    }

    // ========================================================================
    // User actions
    // ========================================================================

    #[instrument(skip(self))]
    fn on_user_action(&mut self, action: UserAction) {
        info!("User action");
        if let Err(e) = self.apply_user_action(action) {
            self.show_error(&e.to_string());
        }
    }

    fn apply_user_action(&mut self, action: UserAction) -> Result<()> {
        match action {
            UserAction::CheckNow => {
                self.show(PhaseId::UpdateChecking);
            }
            UserAction::UpdateNow | UserAction::RetryDownload => self.start_update()?,
            UserAction::PauseDownload => {
                let orchestrator = self.service("pause download")?;
                let id = self.active_id("pause download")?;
                orchestrator
                    .pause_download(&id)
                    .map_err(|e| UpdaterError::command("pause download", e))?;
                self.rebuild(PhaseId::UpdatePaused);
                self.show(PhaseId::UpdatePaused);
            }
            UserAction::ResumeDownload => {
                let orchestrator = self.service("resume download")?;
                let id = self.active_id("resume download")?;
                orchestrator
                    .resume_download(&id)
                    .map_err(|e| UpdaterError::command("resume download", e))?;
                self.show(PhaseId::UpdateDownloading);
            }
            UserAction::CancelDownload => self.cancel_download()?,
            UserAction::PauseInstall => {
                let orchestrator = self.service("pause install")?;
                if !self.config.ab_device || !orchestrator.is_installing_ab() {
                    warn!("Install pause requested without an A/B install, ignoring");
                    return Ok(());
                }
                // The paused phase is only persisted once the installer has stopped
                orchestrator
                    .suspend_install()
                    .map_err(|e| UpdaterError::command("pause install", e))?;
                self.rebuild(PhaseId::UpdateInstallingPaused);
                self.show(PhaseId::UpdateInstallingPaused);
            }
            UserAction::ResumeInstall => {
                let orchestrator = self.service("resume install")?;
                orchestrator
                    .resume_install()
                    .map_err(|e| UpdaterError::command("resume install", e))?;
                self.show(PhaseId::UpdateInstalling);
            }
            UserAction::CancelInstall => {
                let orchestrator = self.service("cancel install")?;
                info!("Cancelling install");
                self.installing = false;
                self.state.clear_session();
                self.show(PhaseId::CheckForUpdates);
                orchestrator
                    .cancel_install()
                    .map_err(|e| UpdaterError::command("cancel install", e))?;
            }
            UserAction::RestartNow => {
                self.state.set_updating(false);
                self.state.flush();
                self.platform
                    .reboot()
                    .map_err(|e| UpdaterError::command("restart", e))?;
            }
            UserAction::AcknowledgeFailure => {
                self.installing = false;
                self.state.clear_session();
                self.show(PhaseId::CheckForUpdates);
            }
            UserAction::TryAgain => {
                self.show(PhaseId::CheckForUpdates);
            }
            UserAction::Exit => {
                self.exit_requested = true;
            }
            UserAction::AcceptEarlyUpdates | UserAction::RejectEarlyUpdates => {
                let accepted = action == UserAction::AcceptEarlyUpdates;
                info!(accepted, "Early updates preference saved");
                self.state.set_early_updates(accepted);
                self.show(PhaseId::CheckForUpdates);
            }
            UserAction::HeaderIconTapped => {
                if self.taps.tap(Instant::now()) && !self.state.was_updating() {
                    self.show(PhaseId::Enrollment);
                }
            }
        }
        Ok(())
    }

    fn start_update(&mut self) -> Result<()> {
        let orchestrator = self.service("download")?;
        let id = self.active_id("download")?;

        if !self.platform.battery_ok() {
            info!("Battery too low, holding download");
            self.battery_hold = true;
            self.set_progress(PhaseId::UpdateAvailable, -1, text::BATTERY_LOW);
            self.pending
                .push(Work::PollBattery(self.config.battery_poll_duration()));
            return Ok(());
        }
        self.battery_hold = false;

        self.state.set_updating(true);
        self.state.reset_progress();
        self.rebuild(PhaseId::UpdateDownloading);
        self.show(PhaseId::UpdateStarting);

        info!(download_id = %id, "Starting download");
        orchestrator
            .start_download(&id)
            .map_err(|e| UpdaterError::command("start download", e))
    }

    fn on_battery_poll(&mut self) {
        if !self.battery_hold {
            return;
        }

        if !self.platform.battery_ok() {
            self.pending
                .push(Work::PollBattery(self.config.battery_poll_duration()));
            return;
        }

        info!("Battery recovered");
        self.battery_hold = false;
        self.state.reset_progress();
        self.rebuild(PhaseId::UpdateAvailable);
        if self.gateway.active() == Some(PhaseId::UpdateAvailable) {
            self.show(PhaseId::UpdateAvailable);
        }
    }

    /// Drop the download and go back to the offer, then re-check quietly
    fn cancel_download(&mut self) -> Result<()> {
        let orchestrator = self.service("cancel download")?;

        self.state.set_updating(false);
        self.installing = false;
        if let Some(record) = &self.record {
            let id = &record.download_id;
            if let Err(e) = orchestrator.pause_download(id) {
                warn!(download_id = %id, error = %e, "Failed to pause download before delete");
            }
            if let Err(e) = orchestrator.delete_update(id) {
                warn!(download_id = %id, error = %e, "Failed to delete update");
            }
        }

        self.state.clear_page_id();
        self.state.reset_progress();
        self.rebuild(PhaseId::UpdateDownloading);
        self.rebuild(PhaseId::UpdatePaused);
        self.show(PhaseId::UpdateAvailable);

        let request = self.check_request();
        self.pending.push(Work::Check(request));
        Ok(())
    }

    // ========================================================================
    // Service events
    // ========================================================================

    fn on_service_event(&mut self, event: ServiceEvent) {
        let id = event.download_id();
        if id.is_empty() {
            warn!(event = event.kind(), "Dropping service event without an update id");
            return;
        }

        let Some(orchestrator) = self.orchestrator.clone() else {
            warn!(event = event.kind(), download_id = %id, "Dropping service event, service not bound");
            return;
        };

        // The service has already forgotten a removed update
        if matches!(event, ServiceEvent::UpdateRemoved { .. }) {
            self.on_update_removed(id);
            return;
        }

        let Some(update) = orchestrator.get_update(id) else {
            warn!(event = event.kind(), download_id = %id, "Dropping service event for unknown update");
            return;
        };

        if let Some(record) = self.record.as_mut() {
            if record.download_id == update.download_id {
                *record = update.clone();
            }
        }

        match event {
            ServiceEvent::StatusChanged { .. } => self.on_status_changed(orchestrator, update),
            ServiceEvent::DownloadProgress { .. } => {
                if matches!(
                    self.gateway.active(),
                    Some(PhaseId::UpdateStarting | PhaseId::UpdateDownloading)
                ) {
                    let progress = update.progress.min(100);
                    let percent = i32::from(progress);
                    let done = update.file_size.saturating_mul(u64::from(progress)) / 100;
                    let step = percent_step(
                        percent,
                        &format!(
                            "{} of {}",
                            format_file_size(done),
                            format_file_size(update.file_size)
                        ),
                    );
                    self.set_progress(PhaseId::UpdateDownloading, percent, &step);
                }
            }
            ServiceEvent::InstallProgress { .. } => {
                if self.gateway.active() == Some(PhaseId::UpdateInstalling) {
                    let percent = i32::from(update.install_progress);
                    let label = if update.finalizing {
                        text::OPTIMIZING
                    } else {
                        text::INSTALLING
                    };
                    self.set_progress(PhaseId::UpdateInstalling, percent, &percent_step(percent, label));
                }
            }
            ServiceEvent::UpdateRemoved { .. } => {}
        }
    }

    fn on_update_removed(&mut self, id: &str) {
        if self.record.as_ref().map(|r| r.download_id.as_str()) != Some(id) {
            debug!(download_id = %id, "Ignoring removal of an inactive update");
            return;
        }

        info!(download_id = %id, "Update removed by service");
        self.record = None;
        self.state.clear_update_record();
        self.installing = false;
        self.state.clear_session();
        self.show(PhaseId::CheckForUpdates);
    }

    fn on_status_changed(&mut self, orchestrator: Arc<dyn Orchestrator>, update: UpdateRecord) {
        if update.status.is_error() {
            warn!(download_id = %update.download_id, status = %update.status, "Update reported a failure");
        } else {
            info!(download_id = %update.download_id, status = %update.status, "Update status changed");
        }

        match update.status {
            UpdateStatus::Starting => {
                self.show(PhaseId::UpdateStarting);
            }
            UpdateStatus::Downloading => {
                self.show(PhaseId::UpdateDownloading);
            }
            UpdateStatus::Paused => {
                self.rebuild(PhaseId::UpdatePaused);
                self.show(PhaseId::UpdatePaused);
            }
            UpdateStatus::PausedError => {
                self.rebuild(PhaseId::UpdateRetryDownload);
                self.show(PhaseId::UpdateRetryDownload);
            }
            UpdateStatus::VerificationFailed => {
                self.rebuild(PhaseId::UpdateRetryDownload);
                if let Some(page) = self.registry.get(PhaseId::UpdateRetryDownload) {
                    let mut page = page.clone();
                    page.status = text::VERIFICATION_FAILED.to_string();
                    self.registry.register(PhaseId::UpdateRetryDownload, page);
                }
                self.show(PhaseId::UpdateRetryDownload);
            }
            UpdateStatus::Verified => {
                self.installing = true;
                self.state.set_updating(true);
                self.state.reset_progress();
                self.rebuild(PhaseId::UpdateInstalling);
                self.show(PhaseId::UpdateInstalling);

                info!(download_id = %update.download_id, "Update verified, installing");
                if let Err(e) = orchestrator.trigger_install(&update.download_id) {
                    self.installing = false;
                    self.show_error(&UpdaterError::command("start install", e).to_string());
                }
            }
            UpdateStatus::Installing => {
                self.installing = true;
                if self.gateway.active() != Some(PhaseId::UpdateInstallingPaused) {
                    self.show(PhaseId::UpdateInstalling);
                }
            }
            UpdateStatus::InstallationFailed => {
                self.installing = false;
                self.show(PhaseId::UpdateInstallFailed);
            }
            UpdateStatus::Installed => {
                self.installing = true;
                self.show(PhaseId::UpdateInstalled);
            }
            UpdateStatus::Unknown | UpdateStatus::Deleted => {
                debug!(status = %update.status, "Status has no phase");
            }
        }
    }

    // ========================================================================
    // Update engine callbacks
    // ========================================================================

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Downloading { fraction } | EngineEvent::Finalizing { fraction } => {
                if self.install_paused() {
                    debug!(?event, "Install paused, ignoring engine progress");
                    return;
                }

                self.installing = true;
                let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as i32;
                let label = match event {
                    EngineEvent::Finalizing { .. } => text::OPTIMIZING,
                    _ => text::INSTALLING,
                };
                self.set_progress(PhaseId::UpdateInstalling, percent, &percent_step(percent, label));
            }
            EngineEvent::UpdatedNeedReboot => {
                info!("Update applied, reboot required");
                self.installing = true;
                self.show(PhaseId::UpdateInstalled);
            }
            EngineEvent::PayloadApplied { success } => {
                info!(success, "Update engine finished");
                self.installing = success;
                if success {
                    self.show(PhaseId::UpdateInstalled);
                } else {
                    self.show(PhaseId::UpdateInstallFailed);
                }
            }
        }
    }

    /// True when the user explicitly paused the install
    fn install_paused(&self) -> bool {
        self.gateway.active() == Some(PhaseId::UpdateInstallingPaused)
            || self.state.page_id() == PhaseId::UpdateInstallingPaused.as_str()
    }

    // ========================================================================
    // Checks
    // ========================================================================

    fn on_scheduled_check(&mut self) {
        let busy = self
            .orchestrator
            .as_ref()
            .map(|o| o.has_active_downloads())
            .unwrap_or(false);
        if self.gateway.active() != Some(PhaseId::CheckForUpdates) || self.state.was_updating() || busy {
            debug!("Skipping scheduled check, lifecycle not idle");
            return;
        }

        if let (Some(period), Some(last)) = (
            self.config.auto_check_interval.period(),
            self.state.last_check(),
        ) {
            let elapsed = Utc::now().signed_duration_since(last);
            if elapsed.to_std().map(|e| e < period).unwrap_or(true) {
                debug!(last_check = %last, "Scheduled check not due yet");
                return;
            }
        }

        info!("Running scheduled update check");
        self.show(PhaseId::UpdateChecking);
    }

    fn on_check_finished(&mut self, outcome: CheckOutcome) {
        if !matches!(outcome, CheckOutcome::Failed(_)) {
            self.state.set_last_check(Utc::now());
        }

        if self.state.was_updating() {
            debug!("Update in progress, ignoring check result");
            return;
        }

        match outcome {
            CheckOutcome::Available { record, changelog } if record.is_newer_than(&self.config.build) => {
                if let Err(e) = self.offer_update(record, &changelog) {
                    self.show_error(&e.to_string());
                }
            }
            CheckOutcome::Available { record, .. } => {
                info!(download_id = %record.download_id, "Offered update is not newer than the running build");
                self.no_update();
            }
            CheckOutcome::UpToDate => {
                info!("System is up to date");
                self.no_update();
            }
            CheckOutcome::Failed(reason) => {
                warn!(reason = %reason, "Update check failed");
                self.no_update();
            }
        }
    }

    fn offer_update(&mut self, record: UpdateRecord, changelog: &str) -> Result<()> {
        let orchestrator = self.service("check")?;

        if let Some(previous) = &self.record {
            if previous.download_id != record.download_id {
                debug!(download_id = %previous.download_id, "Releasing previous update");
                // The previous record stays active until its artifact is gone
                orchestrator
                    .delete_update(&previous.download_id)
                    .map_err(|e| UpdaterError::command("release previous update", e))?;
            }
        }

        info!(
            download_id = %record.download_id,
            version = %record.version,
            size = %format_file_size(record.file_size),
            "Update available"
        );

        self.state.set_update_record(&record);
        orchestrator.add_update(record.clone());
        self.state
            .set_changelog(&compose_changelog(changelog, record.file_size));
        self.record = Some(record);

        self.rebuild_all();
        self.show(PhaseId::UpdateAvailable);
        Ok(())
    }

    fn no_update(&mut self) {
        if let Some(page) = self.registry.get(PhaseId::CheckForUpdates) {
            let mut page = page.clone();
            page.status = text::NO_UPDATE.to_string();
            self.registry.register(PhaseId::CheckForUpdates, page);
        }
        self.show(PhaseId::CheckForUpdates);
    }
}

/// Cold-start phase for a stored `pageId` and `updating` flag
pub fn resolve_stored_phase(stored: &str, was_updating: bool) -> Result<PhaseId> {
    if stored.is_empty() {
        return Ok(PhaseId::UpdateChecking);
    }

    let phase: PhaseId = stored.parse()?;
    let resolved = if phase.is_transient() {
        PhaseId::UpdateChecking
    } else if phase.is_terminal() || was_updating {
        phase
    } else {
        PhaseId::CheckForUpdates
    };
    Ok(resolved)
}
