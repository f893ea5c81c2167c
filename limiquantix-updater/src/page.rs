//! Declarative page snapshots
//!
//! A [`Page`] describes everything the view shows for one phase. Pages are
//! plain data: they are rebuilt when their inputs change and never mutated
//! in place by the view.

use serde::Serialize;

use crate::error::{Result, UpdaterError};
use crate::events::UserAction;
use crate::phase::PhaseId;

/// Percent shown while the bar is indeterminate
pub const INDETERMINATE_PERCENT: u8 = 1;

/// Header icon variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Error,
    Check,
    Loading,
    Download,
    Failure,
    Enroll,
}

/// A button with its bound action. A button cannot exist without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub action: UserAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: UserAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Progress bar state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Label shown above the bar
    pub step: String,
    /// `None` means indeterminate
    pub percent: Option<u8>,
}

impl Progress {
    /// Build from a raw percent where any negative value means indeterminate
    pub fn from_raw(percent: i32, step: impl Into<String>) -> Self {
        let percent = if percent < 0 {
            None
        } else {
            Some(percent.min(100) as u8)
        };
        Self {
            step: step.into(),
            percent,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.percent.is_none()
    }

    /// Percent to draw; indeterminate bars are clamped to a sentinel
    pub fn display_percent(&self) -> u8 {
        self.percent.unwrap_or(INDETERMINATE_PERCENT)
    }
}

/// Rich content region (changelog, build card, diagnostics)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RichContent {
    /// HTML fragment
    pub body: String,
    /// Accent colour as 0xRRGGBB
    pub accent: Option<u32>,
}

impl RichContent {
    pub fn new(body: impl Into<String>, accent: Option<u32>) -> Self {
        Self {
            body: body.into(),
            accent,
        }
    }

    /// Complete HTML document handed to the content view
    pub fn document(&self) -> String {
        let color = match self.accent {
            Some(rgb) => format!("; color: #{:06X}", rgb & 0x00FF_FFFF),
            None => String::new(),
        };
        format!(
            "<html><head><style>body {{ font-size: light{}; display:inline; padding:0px; \
             margin:0px; letter-spacing: -0.02; line-height: 1.5; }}</style></head>\
             <body>{}</body></html>",
            color, self.body
        )
    }
}

/// Side effect a page triggers once per activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundAction {
    /// Spin the progress bar and run an update check on a worker
    BeginCheck,
    /// Log the diagnostic carried in the page content
    ReportDiagnostic,
}

/// UI snapshot for one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub phase: PhaseId,
    pub icon: Option<Icon>,
    pub title: String,
    pub status: String,
    pub primary: Option<Button>,
    pub secondary: Option<Button>,
    pub extra: Option<Button>,
    pub progress: Option<Progress>,
    pub content: RichContent,
    pub background: Option<BackgroundAction>,
}

impl Page {
    /// Empty page for a phase
    pub fn new(phase: PhaseId) -> Self {
        Self {
            phase,
            icon: None,
            title: String::new(),
            status: String::new(),
            primary: None,
            secondary: None,
            extra: None,
            progress: None,
            content: RichContent::default(),
            background: None,
        }
    }

    /// Buttons in slot order
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        [&self.primary, &self.secondary, &self.extra]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Find the slot bound to `action`
    pub fn has_action(&self, action: UserAction) -> bool {
        self.buttons().any(|button| button.action == action)
    }

    /// Check the presentation invariants before the page reaches a view
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| UpdaterError::InvalidPage {
            phase: self.phase.to_string(),
            reason: reason.to_string(),
        };

        if self.buttons().any(|button| button.label.trim().is_empty()) {
            return Err(invalid("button without a label"));
        }
        if self.secondary.is_some() && self.primary.is_none() {
            return Err(invalid("secondary button without a primary button"));
        }
        if self.phase == PhaseId::Error && self.primary.is_none() {
            return Err(invalid("error page must offer an action"));
        }
        Ok(())
    }
}
