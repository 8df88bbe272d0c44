//! The popup surface: transient read-models over the cache. The popup never
//! talks to the backend directly; it renders whatever the cache holds.

use anyhow::Result;

use crate::cache::Store;
use crate::models::{JobRecord, Profile, Settings};

/// How many captures the popup lists.
pub const RECENT_JOBS_SHOWN: usize = 3;

pub struct AuthStatus {
    pub token_present: bool,
    pub profile: Option<Profile>,
}

impl AuthStatus {
    /// Signed in means both a token and a cached profile are present.
    pub fn signed_in(&self) -> bool {
        self.token_present && self.profile.is_some()
    }
}

pub async fn auth_status(store: &Store) -> Result<AuthStatus> {
    Ok(AuthStatus {
        token_present: store.auth_token().await?.is_some(),
        profile: store.profile().await?,
    })
}

/// Most recent captures first.
pub async fn recent_jobs(store: &Store, limit: usize) -> Result<Vec<JobRecord>> {
    let jobs = store.scraped_jobs().await?;
    Ok(jobs.into_iter().rev().take(limit).collect())
}

pub async fn load_settings(store: &Store) -> Result<Settings> {
    store.settings().await
}

pub async fn save_settings(store: &Store, settings: &Settings) -> Result<()> {
    store.set_settings(settings).await
}

pub async fn reset_settings(store: &Store) -> Result<Settings> {
    let defaults = Settings::default();
    store.set_settings(&defaults).await?;
    Ok(defaults)
}

/// Sign out: drop the token and the cached profile. Captured jobs stay.
pub async fn sign_out(store: &Store) -> Result<()> {
    store.clear_auth_token().await?;
    store.clear_profile().await?;
    Ok(())
}
