//! Spinners and check reports.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::context::UiContext;
use super::render::badge;
use super::theme::Badge;

const BRAILLE_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", ""];
const ASCII_TICKS: &[&str] = &["|", "/", "-", "\\", ""];

/// Shown while a password KDF runs, cleared on drop.
///
/// Inert unless the terminal allows animation.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(ctx: &UiContext, message: &str) -> Self {
        if !ctx.allows_animation() {
            return Self { bar: None };
        }
        let (template, ticks) = if ctx.unicode {
            ("{spinner:.cyan} {msg}...", BRAILLE_TICKS)
        } else {
            ("{spinner} {msg}...", ASCII_TICKS)
        };
        let bar = ProgressBar::new_spinner().with_message(message.to_string());
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            bar.set_style(style.tick_strings(ticks));
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar: Some(bar) }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Result of one check; ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    Pass,
    Warn,
    Fail,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }

    fn badge(self) -> Badge {
        match self {
            Self::Pass => Badge::Ok,
            Self::Warn => Badge::Warn,
            Self::Fail => Badge::Err,
        }
    }
}

/// Check results, each printed as soon as it is recorded.
pub struct CheckReport<'a> {
    ctx: &'a UiContext,
    results: Vec<(&'static str, Outcome)>,
}

impl<'a> CheckReport<'a> {
    pub fn new(ctx: &'a UiContext) -> Self {
        Self {
            ctx,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &'static str, outcome: Outcome) {
        self.results.push((name, outcome));
        if self.ctx.mode.is_pretty() {
            println!("- {}: {}", name, badge(self.ctx, outcome.badge(), ""));
        } else if !self.ctx.mode.is_json() {
            println!("check={} {}", name.to_lowercase(), outcome.label());
        }
    }

    /// Worst outcome recorded so far.
    pub fn status(&self) -> Outcome {
        self.results
            .iter()
            .map(|(_, outcome)| *outcome)
            .max()
            .unwrap_or(Outcome::Pass)
    }
}
