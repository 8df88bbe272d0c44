use scraper::{Html, Selector};
use tracing::debug;

use crate::models::JobRecord;
use crate::sites::SiteConfig;

/// Result of one extraction pass over a page snapshot. `Incomplete` is not
/// an error: it means "required fields not on the page yet, try again when
/// the content changes".
pub enum Extraction {
    Complete(JobRecord),
    Incomplete,
}

/// Read job fields from the page using the site's extraction locators.
/// Title and description are required; company is best-effort.
pub fn extract(document: &Html, site: &SiteConfig, page_url: &str) -> Extraction {
    let title = select_text(document, &site.extract.title);
    let company = select_text(document, &site.extract.company);
    let description = select_text(document, &site.extract.description);

    match (title, description) {
        (Some(title), Some(description)) => Extraction::Complete(JobRecord::new(
            title,
            company,
            description,
            page_url.to_string(),
        )),
        _ => Extraction::Incomplete,
    }
}

fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    let element = document.select(selector).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Attempting,
    /// Required fields were missing on load; re-extract on every content
    /// mutation until one succeeds or the attempt budget runs out.
    Observing,
    Captured,
    Exhausted,
}

/// Per-page-load capture driver: one initial attempt, then bounded
/// mutation-driven retries. At most one record is ever emitted; the watcher
/// disconnects (leaves `Observing`) before the record is handed out, so a
/// mutation arriving mid-capture can never double-fire.
pub struct PageWatcher<'a> {
    site: &'a SiteConfig,
    page_url: String,
    state: CaptureState,
    attempts: u32,
    max_attempts: u32,
}

impl<'a> PageWatcher<'a> {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

    pub fn new(site: &'a SiteConfig, page_url: impl Into<String>) -> Self {
        Self {
            site,
            page_url: page_url.into(),
            state: CaptureState::Idle,
            attempts: 0,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Still registered for content mutations?
    pub fn is_observing(&self) -> bool {
        self.state == CaptureState::Observing
    }

    /// Initial attempt on page load.
    pub fn on_load(&mut self, html: &str) -> Option<JobRecord> {
        if self.state != CaptureState::Idle {
            return None;
        }
        self.state = CaptureState::Attempting;
        match extract(&Html::parse_document(html), self.site, &self.page_url) {
            Extraction::Complete(record) => {
                self.state = CaptureState::Captured;
                Some(record)
            }
            Extraction::Incomplete => {
                debug!(url = %self.page_url, "required fields missing, observing for content");
                self.state = CaptureState::Observing;
                None
            }
        }
    }

    /// Re-extract after a content mutation. Ignored unless observing.
    pub fn on_mutation(&mut self, html: &str) -> Option<JobRecord> {
        if self.state != CaptureState::Observing {
            return None;
        }
        self.attempts += 1;
        match extract(&Html::parse_document(html), self.site, &self.page_url) {
            Extraction::Complete(record) => {
                // Disconnect before emitting so this can't fire twice.
                self.state = CaptureState::Captured;
                Some(record)
            }
            Extraction::Incomplete => {
                if self.attempts >= self.max_attempts {
                    debug!(
                        url = %self.page_url,
                        attempts = self.attempts,
                        "giving up on page, content never matched"
                    );
                    self.state = CaptureState::Exhausted;
                }
                None
            }
        }
    }
}
