use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub source_url: String,
    pub captured_at: DateTime<Utc>, // set once at creation, record is immutable after
}

impl JobRecord {
    pub fn new(
        title: String,
        company: Option<String>,
        description: String,
        source_url: String,
    ) -> Self {
        Self {
            title,
            company,
            description,
            source_url,
            captured_at: Utc::now(),
        }
    }
}

/// Candidate identity data used for autofill. The backend's `/users/me`
/// response uses snake_case field names, the cached copy uses camelCase;
/// the aliases accept both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "full_name")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "linkedin_url")]
    pub linked_in: Option<String>,
    #[serde(alias = "website_url")]
    pub website: Option<String>,
    #[serde(alias = "cover_letter")]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enable_autofill: bool,
    pub enable_job_scraping: bool,
    pub show_notifications: bool,
    pub api_url: String,
}

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_DASHBOARD_URL: &str = "http://localhost:3000/job-applications";

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_autofill: true,
            enable_job_scraping: true,
            show_notifications: true,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}
