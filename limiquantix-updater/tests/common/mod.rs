//! Mock collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use limiquantix_updater::config::UpdaterConfig;
use limiquantix_updater::controller::LifecycleController;
use limiquantix_updater::orchestrator::{CheckRequest, Orchestrator, Platform, UpdateChecker};
use limiquantix_updater::page::Page;
use limiquantix_updater::phase::PhaseId;
use limiquantix_updater::record::{UpdateRecord, UpdateStatus};
use limiquantix_updater::store::PersistedState;
use limiquantix_updater::view::View;

pub const UPDATE_ID: &str = "ota-1";

/// An update newer than the default build
pub fn offered_update() -> UpdateRecord {
    UpdateRecord {
        name: "quantix-ota-1.zip".to_string(),
        version: "0.0.2".to_string(),
        timestamp: 1_700_000_000,
        file_size: 1_500_000,
        changelog_url: "https://updates.example.invalid/changelog/ota-1".to_string(),
        ..UpdateRecord::new(UPDATE_ID)
    }
}

#[derive(Default)]
struct OrchestratorState {
    updates: HashMap<String, UpdateRecord>,
    downloading: bool,
    verifying: bool,
    installing: bool,
    waiting_for_reboot: bool,
    installing_ab: bool,
    fail_commands: bool,
    calls: Vec<String>,
}

/// In-memory download/install service
#[derive(Default)]
pub struct MockOrchestrator {
    inner: Mutex<OrchestratorState>,
}

impl MockOrchestrator {
    pub fn new() -> Arc<Self> {
        let mock = Self::default();
        mock.inner.lock().unwrap().installing_ab = true;
        Arc::new(mock)
    }

    pub fn with_update(record: UpdateRecord) -> Arc<Self> {
        let mock = Self::new();
        mock.inner
            .lock()
            .unwrap()
            .updates
            .insert(record.download_id.clone(), record);
        mock
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn set_status(&self, id: &str, status: UpdateStatus) {
        if let Some(update) = self.inner.lock().unwrap().updates.get_mut(id) {
            update.status = status;
        }
    }

    pub fn set_progress(&self, id: &str, progress: u8) {
        if let Some(update) = self.inner.lock().unwrap().updates.get_mut(id) {
            update.progress = progress;
        }
    }

    pub fn set_install_progress(&self, id: &str, progress: u8, finalizing: bool) {
        if let Some(update) = self.inner.lock().unwrap().updates.get_mut(id) {
            update.install_progress = progress;
            update.finalizing = finalizing;
        }
    }

    pub fn set_downloading(&self, value: bool) {
        self.inner.lock().unwrap().downloading = value;
    }

    pub fn set_installing(&self, value: bool) {
        self.inner.lock().unwrap().installing = value;
    }

    pub fn set_waiting_for_reboot(&self, value: bool) {
        self.inner.lock().unwrap().waiting_for_reboot = value;
    }

    pub fn fail_commands(&self) {
        self.inner.lock().unwrap().fail_commands = true;
    }

    pub fn has_update(&self, id: &str) -> bool {
        self.inner.lock().unwrap().updates.contains_key(id)
    }

    fn command(&self, call: String) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call.clone());
        if inner.fail_commands {
            anyhow::bail!("service refused {}", call);
        }
        Ok(())
    }
}

impl Orchestrator for MockOrchestrator {
    fn get_update(&self, download_id: &str) -> Option<UpdateRecord> {
        self.inner.lock().unwrap().updates.get(download_id).cloned()
    }

    fn add_update(&self, record: UpdateRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("add_update:{}", record.download_id));
        inner.updates.insert(record.download_id.clone(), record);
    }

    fn is_downloading(&self, _download_id: &str) -> bool {
        self.inner.lock().unwrap().downloading
    }

    fn is_verifying(&self, _download_id: &str) -> bool {
        self.inner.lock().unwrap().verifying
    }

    fn is_installing(&self, _download_id: &str) -> bool {
        self.inner.lock().unwrap().installing
    }

    fn is_waiting_for_reboot(&self, _download_id: &str) -> bool {
        self.inner.lock().unwrap().waiting_for_reboot
    }

    fn is_installing_ab(&self) -> bool {
        self.inner.lock().unwrap().installing_ab
    }

    fn has_active_downloads(&self) -> bool {
        self.inner.lock().unwrap().downloading
    }

    fn start_download(&self, download_id: &str) -> Result<()> {
        self.command(format!("start_download:{}", download_id))
    }

    fn pause_download(&self, download_id: &str) -> Result<()> {
        self.command(format!("pause_download:{}", download_id))
    }

    fn resume_download(&self, download_id: &str) -> Result<()> {
        self.command(format!("resume_download:{}", download_id))
    }

    fn delete_update(&self, download_id: &str) -> Result<()> {
        self.inner.lock().unwrap().updates.remove(download_id);
        self.command(format!("delete_update:{}", download_id))
    }

    fn trigger_install(&self, download_id: &str) -> Result<()> {
        self.command(format!("trigger_install:{}", download_id))
    }

    fn cancel_install(&self) -> Result<()> {
        self.command("cancel_install".to_string())
    }

    fn suspend_install(&self) -> Result<()> {
        self.command("suspend_install".to_string())
    }

    fn resume_install(&self) -> Result<()> {
        self.command("resume_install".to_string())
    }
}

/// Device with a switchable battery and a reboot counter
#[derive(Clone)]
pub struct MockPlatform {
    pub battery_ok: Arc<AtomicBool>,
    pub reboots: Arc<AtomicUsize>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            battery_ok: Arc::new(AtomicBool::new(true)),
            reboots: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_battery_ok(&self, ok: bool) {
        self.battery_ok.store(ok, Ordering::SeqCst);
    }

    pub fn reboot_count(&self) -> usize {
        self.reboots.load(Ordering::SeqCst)
    }
}

impl Platform for MockPlatform {
    fn battery_ok(&self) -> bool {
        self.battery_ok.load(Ordering::SeqCst)
    }

    fn reboot(&self) -> Result<()> {
        self.reboots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One `View::render` call
#[derive(Debug, Clone)]
pub struct Render {
    pub page: Page,
    pub reload_content: bool,
}

/// View that records every render
#[derive(Clone, Default)]
pub struct RecordingView {
    pub renders: Arc<Mutex<Vec<Render>>>,
}

impl RecordingView {
    pub fn phases(&self) -> Vec<PhaseId> {
        self.renders
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.page.phase)
            .collect()
    }

    pub fn last(&self) -> Option<Render> {
        self.renders.lock().unwrap().last().cloned()
    }
}

impl View for RecordingView {
    fn render(&mut self, page: &Page, reload_content: bool) {
        self.renders.lock().unwrap().push(Render {
            page: page.clone(),
            reload_content,
        });
    }
}

/// Update server returning a fixed answer
pub struct MockChecker {
    pub offer: Option<UpdateRecord>,
    pub changelog: String,
    pub requests: Mutex<Vec<CheckRequest>>,
}

impl MockChecker {
    pub fn offering(record: UpdateRecord) -> Arc<Self> {
        Arc::new(Self {
            offer: Some(record),
            changelog: "<p>Bug fixes</p>".to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl UpdateChecker for MockChecker {
    async fn check(&self, request: &CheckRequest) -> Result<Option<UpdateRecord>> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.offer.clone())
    }

    async fn fetch_changelog(&self, _url: &str) -> Result<String> {
        Ok(self.changelog.clone())
    }
}

/// Everything a controller test needs
pub struct Harness {
    pub controller: LifecycleController,
    pub orchestrator: Arc<MockOrchestrator>,
    pub platform: MockPlatform,
    pub view: RecordingView,
}

impl Harness {
    /// Controller over `state` with a bound service and an attached view
    pub fn new(state: PersistedState, orchestrator: Arc<MockOrchestrator>) -> Self {
        Self::with_config(UpdaterConfig::default(), state, orchestrator)
    }

    pub fn with_config(
        config: UpdaterConfig,
        state: PersistedState,
        orchestrator: Arc<MockOrchestrator>,
    ) -> Self {
        let platform = MockPlatform::new();
        let view = RecordingView::default();
        let mut controller = LifecycleController::new(config, state, Box::new(platform.clone()));
        controller.attach_view(Box::new(view.clone()));
        controller.attach_orchestrator(orchestrator.clone());
        Self {
            controller,
            orchestrator,
            platform,
            view,
        }
    }

    pub fn active(&self) -> Option<PhaseId> {
        self.controller.active_phase()
    }

    pub fn page(&self, phase: PhaseId) -> Page {
        self.controller.registry().get(phase).cloned().unwrap()
    }
}
