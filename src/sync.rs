use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{JobRecord, Profile};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend rejected the auth token")]
    Unauthorized,
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Outcome of a capture push. A failed push degrades to `Unsynced`: the
/// record stays in the local cache and no retry is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Synced,
    Unsynced,
}

/// The backend REST contract the sync engine consumes.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn push_job(&self, record: &JobRecord, token: &str) -> Result<(), ApiError>;
    async fn fetch_profile(&self, token: &str) -> Result<Profile, ApiError>;
    async fn login(&self, email: &str, password: &str) -> Result<String, ApiError>;
    async fn register(&self, email: &str, password: &str) -> Result<String, ApiError>;
}

#[derive(Serialize)]
pub(crate) struct JobPayload<'a> {
    job_title: &'a str,
    company: Option<&'a str>,
    job_description: &'a str,
    job_url: &'a str,
}

impl<'a> JobPayload<'a> {
    pub(crate) fn from_record(record: &'a JobRecord) -> Self {
        Self {
            job_title: &record.title,
            company: record.company.as_deref(),
            job_description: &record.description,
            job_url: &record.source_url,
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    fn check(response: &reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 401 {
            warn!("backend returned 401, token is no longer valid");
            return Err(ApiError::Unauthorized);
        }
        Err(ApiError::Status(status.as_u16()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn push_job(&self, record: &JobRecord, token: &str) -> Result<(), ApiError> {
        debug!(url = %record.source_url, "pushing captured job to backend");
        let response = self
            .client
            .post(self.url("/jobs"))
            .bearer_auth(token)
            .json(&JobPayload::from_record(record))
            .send()
            .await?;
        Self::check(&response)?;
        info!(title = %record.title, "job pushed to backend");
        Ok(())
    }

    async fn fetch_profile(&self, token: &str) -> Result<Profile, ApiError> {
        let response = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(&response)?;
        let profile = response.json::<Profile>().await?;
        debug!("fetched profile from backend");
        Ok(profile)
    }

    async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        Self::check(&response)?;
        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    async fn register(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&Credentials { email, password })
            .send()
            .await?;
        Self::check(&response)?;
        Ok(response.json::<TokenResponse>().await?.access_token)
    }
}
