//! Render gateway
//!
//! The single place a phase becomes visible. [`RenderGateway::show`]:
//!
//! 1. reconciles the requested phase with the service's ground truth,
//! 2. clears the "ran" flag of the phase being left,
//! 3. fetches the page, falling back to `error` with a diagnostic,
//! 4. persists the phase id (transient phases excluded),
//! 5. hands the page to the view and reports the background action to fire,
//!    at most once per activation.
//!
//! With no view attached only steps 1-4 happen.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::events::UserAction;
use crate::orchestrator::GroundTruth;
use crate::page::{BackgroundAction, Button, Page, RichContent};
use crate::phase::PhaseId;
use crate::registry::{text, PageRegistry};
use crate::store::PersistedState;
use crate::view::View;

/// What `show` needs to borrow from the controller
pub struct RenderContext<'a> {
    pub registry: &'a PageRegistry,
    pub state: &'a mut PersistedState,
    /// `None` while no orchestrator is bound
    pub ground_truth: Option<GroundTruth>,
    /// An install is known to be running in this process
    pub installing: bool,
}

/// Result of one `show`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shown {
    /// The phase that ended up active
    pub phase: PhaseId,
    /// Background action to run now, if this is its first firing
    pub background: Option<BackgroundAction>,
    /// The request was redirected by reconciliation
    pub redirected: bool,
}

#[derive(Default)]
pub struct RenderGateway {
    view: Option<Box<dyn View>>,
    active: Option<PhaseId>,
    ran: HashSet<PhaseId>,
    last_document: Option<String>,
    diagnostic: Option<String>,
}

impl RenderGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_view(&mut self, view: Box<dyn View>) {
        self.view = Some(view);
        self.last_document = None;
    }

    pub fn detach_view(&mut self) -> Option<Box<dyn View>> {
        self.last_document = None;
        self.view.take()
    }

    /// Currently active phase, if anything was shown yet
    pub fn active(&self) -> Option<PhaseId> {
        self.active
    }

    /// Whether `phase` already fired its background action this activation
    pub fn has_run(&self, phase: PhaseId) -> bool {
        self.ran.contains(&phase)
    }

    /// Diagnostic carried by the last error page
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Show `phase`
    pub fn show(&mut self, phase: PhaseId, ctx: RenderContext<'_>) -> Shown {
        let (target, redirected) = Self::reconcile(phase, &ctx);
        if redirected {
            info!(
                requested = %phase,
                "No download or install is running, not resuming stale phase"
            );
            ctx.state.clear_session();
        }

        let page = match ctx.registry.get(target) {
            Some(page) => match page.validate() {
                Ok(()) => page.clone(),
                Err(e) => error_page(ctx.registry, &e.to_string()),
            },
            None => error_page(
                ctx.registry,
                &format!("No page registered for phase {}", target),
            ),
        };

        let mut shown = self.present(page, ctx);
        shown.redirected = redirected;
        shown
    }

    /// Show the `error` phase with `diagnostic` embedded
    pub fn show_error(&mut self, diagnostic: &str, ctx: RenderContext<'_>) -> Shown {
        let page = error_page(ctx.registry, diagnostic);
        self.present(page, ctx)
    }

    fn reconcile(phase: PhaseId, ctx: &RenderContext<'_>) -> (PhaseId, bool) {
        let Some(truth) = ctx.ground_truth else {
            return (phase, false);
        };

        if phase.requires_install_ground_truth() && !ctx.installing && !truth.is_busy() {
            (PhaseId::CheckForUpdates, true)
        } else {
            (phase, false)
        }
    }

    fn present(&mut self, page: Page, ctx: RenderContext<'_>) -> Shown {
        let phase = page.phase;

        if self.active != Some(phase) {
            if let Some(previous) = self.active {
                self.ran.remove(&previous);
            }
            debug!(from = ?self.active.map(|p| p.as_str()), to = %phase, "Phase changed");
            self.active = Some(phase);
        }

        if phase == PhaseId::Error {
            self.diagnostic = Some(page.content.body.clone());
        }

        ctx.state.set_page_id(phase);

        let mut shown = Shown {
            phase,
            background: None,
            redirected: false,
        };

        let Some(view) = self.view.as_mut() else {
            debug!(phase = %phase, "No view attached, state persisted only");
            return shown;
        };

        let document = page.content.document();
        let reload = self.last_document.as_deref() != Some(document.as_str());
        view.render(&page, reload);
        self.last_document = Some(document);

        if let Some(action) = page.background {
            if self.ran.insert(phase) {
                shown.background = Some(action);
            }
        }

        shown
    }
}

/// The registry's error page carrying `diagnostic`, or a synthesized one
fn error_page(registry: &PageRegistry, diagnostic: &str) -> Page {
    warn!(diagnostic = %diagnostic, "Falling back to error page");

    let mut page = registry.get(PhaseId::Error).cloned().unwrap_or_else(|| {
        let mut page = Page::new(PhaseId::Error);
        page.title = text::ERROR_TITLE.to_string();
        page.status = text::ERROR_STATUS.to_string();
        page.primary = Some(Button::new(text::TRY_AGAIN, UserAction::TryAgain));
        page.background = Some(BackgroundAction::ReportDiagnostic);
        page
    });
    page.content = RichContent::new(diagnostic, page.content.accent);
    page
}
