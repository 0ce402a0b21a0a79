//! Progress display for `ctxlint audit` while a run is in flight.
//!
//! One `indicatif` bar shows the current phase as a spinner, then switches to
//! a page counter once page audits start.

use crate::audit::orchestrator::{AuditPhase, PhaseFn};
use crate::pool::manager::ProgressFn;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "  {spinner:.cyan} {msg}";
const PAGES_TEMPLATE: &str = "  {spinner:.blue} {msg} [{bar:24.cyan/dim}] {pos}/{len}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("\u{25b8}\u{25b9}\u{25b8}\u{25b9}\u{25b8}")
}

fn phase_label(phase: AuditPhase) -> &'static str {
    match phase {
        AuditPhase::Discovering => "Discovering pages",
        AuditPhase::Auditing => "Auditing pages",
        AuditPhase::Aggregating => "Aggregating scores",
        AuditPhase::Done => "Done",
        AuditPhase::Failed => "Failed",
    }
}

/// Spinner plus page counter for one audit run.
pub struct AuditProgress {
    bar: ProgressBar,
}

impl AuditProgress {
    pub fn start(url: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(style(SPINNER_TEMPLATE));
        bar.set_message(format!("Fetching {url}"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Callback for `Auditor::on_phase`.
    pub fn phase_fn(&self) -> PhaseFn {
        let bar = self.bar.clone();
        Arc::new(move |phase: AuditPhase| {
            if phase == AuditPhase::Auditing {
                bar.set_style(style(PAGES_TEMPLATE));
            } else if phase != AuditPhase::Discovering {
                bar.set_style(style(SPINNER_TEMPLATE));
            }
            bar.set_message(phase_label(phase));
        })
    }

    /// Callback for `Auditor::on_progress`.
    pub fn page_fn(&self) -> ProgressFn {
        let bar = self.bar.clone();
        Arc::new(move |done: usize, total: usize| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
