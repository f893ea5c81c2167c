//! View layer contract

use tracing::info;

use crate::page::Page;

/// Something that can draw a [`Page`].
///
/// Views are only ever called from the UI loop.
pub trait View: Send {
    /// Show `page`. `reload_content` is false when the rich content document
    /// is identical to the one rendered last time.
    fn render(&mut self, page: &Page, reload_content: bool);
}

/// Headless view that writes every render to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogView;

impl LogView {
    pub fn new() -> Self {
        Self
    }
}

impl View for LogView {
    fn render(&mut self, page: &Page, reload_content: bool) {
        let buttons: Vec<&str> = page.buttons().map(|b| b.label.as_str()).collect();
        let progress = page
            .progress
            .as_ref()
            .map(|p| {
                if p.is_indeterminate() {
                    format!("… {}", p.step)
                } else {
                    format!("{}% {}", p.display_percent(), p.step)
                }
            })
            .unwrap_or_default();

        info!(
            phase = %page.phase,
            status = %page.status,
            buttons = ?buttons,
            progress = %progress,
            reload_content,
            "Page rendered"
        );
    }
}
