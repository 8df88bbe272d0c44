use std::time::Duration;

use crate::models::JobRecord;

// Auto-dismiss delays per notice kind.
pub const CAPTURE_DISMISS_AFTER: Duration = Duration::from_secs(10);
pub const FILL_DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    ViewInDashboard,
    OpenSettings,
    Dismiss,
}

impl NoticeAction {
    pub fn label(&self) -> &'static str {
        match self {
            NoticeAction::ViewInDashboard => "View in Dashboard",
            NoticeAction::OpenSettings => "Open Settings",
            NoticeAction::Dismiss => "Dismiss",
        }
    }
}

/// A dismissible, timed UI affordance. Rendering is up to the sink; the
/// notice itself is just title, body, buttons and a dismissal deadline.
#[derive(Debug, Clone)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub actions: Vec<NoticeAction>,
    pub auto_dismiss: Duration,
}

impl Notice {
    pub fn capture(record: &JobRecord) -> Self {
        Self {
            title: "Job Captured".to_string(),
            body: format!(
                "\"{}\" at {} has been saved.",
                record.title,
                record.company.as_deref().unwrap_or("Unknown")
            ),
            actions: vec![NoticeAction::ViewInDashboard, NoticeAction::Dismiss],
            auto_dismiss: CAPTURE_DISMISS_AFTER,
        }
    }

    pub fn filled(count: usize) -> Self {
        Self {
            title: "Application Form Filled".to_string(),
            body: format!(
                "{} form field{} filled with your profile data.",
                count,
                if count == 1 { "" } else { "s" }
            ),
            actions: vec![NoticeAction::OpenSettings, NoticeAction::Dismiss],
            auto_dismiss: FILL_DISMISS_AFTER,
        }
    }
}

pub trait NoticeSink: Send + Sync {
    fn show(&self, notice: Notice);
}

/// CLI rendition of the notice.
pub struct TerminalSink;

impl NoticeSink for TerminalSink {
    fn show(&self, notice: Notice) {
        println!("[{}] {}", notice.title, notice.body);
        let buttons: Vec<&str> = notice.actions.iter().map(|a| a.label()).collect();
        println!("        ({})", buttons.join(" | "));
    }
}
