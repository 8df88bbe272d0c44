use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::Action;
use crate::cache::Store;
use crate::models::{JobRecord, Profile};
use crate::notify::Notice;
use crate::sync::{ApiError, Backend, PushOutcome};

/// Things the coordinator asks the host UI to do.
#[derive(Debug)]
pub enum HostEvent {
    ShowNotice(Notice),
    OpenTab(String),
}

/// The long-lived background context. Owns the cache handle, the backend
/// client, the hydrated job list and the in-memory profile layer; everything
/// else talks to it through the bus. Handlers run to completion (or a
/// suspension point) before the next queued action is processed.
pub struct Coordinator {
    cache: Store,
    backend: Box<dyn Backend>,
    dashboard_url: String,
    events: mpsc::UnboundedSender<HostEvent>,
    /// Mirrors the persisted copy to avoid redundant reads within one
    /// coordinator lifetime. The persisted copy is authoritative.
    profile: Option<Profile>,
    jobs: Vec<JobRecord>,
}

impl Coordinator {
    /// Hydrates the job list from the cache; there is no other startup
    /// state, and no state outside this struct.
    pub async fn new(
        cache: Store,
        backend: Box<dyn Backend>,
        dashboard_url: impl Into<String>,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Result<Self> {
        let jobs = cache.scraped_jobs().await?;
        debug!(count = jobs.len(), "hydrated captured jobs from cache");
        Ok(Self {
            cache,
            backend,
            dashboard_url: dashboard_url.into(),
            events,
            profile: None,
            jobs,
        })
    }

    /// Consume bus actions until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Action>) {
        while let Some(action) = rx.recv().await {
            self.handle(action).await;
        }
        debug!("bus closed, coordinator shutting down");
    }

    async fn handle(&mut self, action: Action) {
        match action {
            Action::JobScraped(record) => self.handle_job_scraped(record).await,
            Action::OpenDashboard => {
                let _ = self
                    .events
                    .send(HostEvent::OpenTab(self.dashboard_url.clone()));
            }
            Action::GetProfile { reply } => {
                let _ = reply.send(self.resolve_profile().await);
            }
        }
    }

    /// Persist the capture, notify the user, and push to the backend if a
    /// token is present. No failure here may escape the coordinator.
    async fn handle_job_scraped(&mut self, record: JobRecord) {
        info!(title = %record.title, url = %record.source_url, "job captured");

        self.jobs.push(record.clone());
        if let Err(e) = self.cache.set_scraped_jobs(&self.jobs).await {
            error!(error = %e, "failed to persist captured job");
        }

        let show_notifications = match self.cache.settings().await {
            Ok(settings) => settings.show_notifications,
            Err(e) => {
                error!(error = %e, "failed to load settings, assuming defaults");
                true
            }
        };
        if show_notifications {
            let _ = self.events.send(HostEvent::ShowNotice(Notice::capture(&record)));
        }

        match self.cache.auth_token().await {
            Ok(Some(token)) => {
                if self.push_job(&record, &token).await == PushOutcome::Unsynced {
                    debug!("capture remains local only");
                }
            }
            Ok(None) => debug!("no auth token, capture kept local only"),
            Err(e) => error!(error = %e, "failed to read auth token"),
        }
    }

    /// Fire-and-forget push. Failure degrades to Unsynced; the record is
    /// already in the cache and is not retried.
    async fn push_job(&self, record: &JobRecord, token: &str) -> PushOutcome {
        match self.backend.push_job(record, token).await {
            Ok(()) => PushOutcome::Synced,
            Err(ApiError::Unauthorized) => {
                self.drop_token().await;
                PushOutcome::Unsynced
            }
            Err(e) => {
                warn!(error = %e, "push failed, record remains local");
                PushOutcome::Unsynced
            }
        }
    }

    /// Cache-first profile resolution: in-memory layer, then persisted
    /// cache, then a backend fetch if a token is present. A successful
    /// fetch populates both layers; any failure resolves to `None`.
    pub async fn resolve_profile(&mut self) -> Option<Profile> {
        if let Some(profile) = &self.profile {
            return Some(profile.clone());
        }

        match self.cache.profile().await {
            Ok(Some(profile)) => {
                self.profile = Some(profile.clone());
                return Some(profile);
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "failed to read cached profile");
                return None;
            }
        }

        let token = match self.cache.auth_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("no auth token, profile unavailable");
                return None;
            }
            Err(e) => {
                error!(error = %e, "failed to read auth token");
                return None;
            }
        };

        match self.backend.fetch_profile(&token).await {
            Ok(profile) => {
                if let Err(e) = self.cache.set_profile(&profile).await {
                    error!(error = %e, "failed to persist fetched profile");
                }
                self.profile = Some(profile.clone());
                Some(profile)
            }
            Err(ApiError::Unauthorized) => {
                self.drop_token().await;
                None
            }
            Err(e) => {
                warn!(error = %e, "profile fetch failed");
                None
            }
        }
    }

    /// A 401 means the token is dead: clear it so the user is signed out
    /// on their next interaction.
    async fn drop_token(&self) {
        if let Err(e) = self.cache.clear_auth_token().await {
            error!(error = %e, "failed to clear expired auth token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;
    use crate::notify::NoticeAction;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct FakeBackend {
        pushes: Arc<AtomicUsize>,
        fetches: Arc<AtomicUsize>,
        fail_push: Arc<AtomicBool>,
        unauthorized: Arc<AtomicBool>,
        profile: Arc<std::sync::Mutex<Profile>>,
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn push_job(&self, _record: &JobRecord, _token: &str) -> Result<(), ApiError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if self.unauthorized.load(Ordering::SeqCst) {
                Err(ApiError::Unauthorized)
            } else if self.fail_push.load(Ordering::SeqCst) {
                Err(ApiError::Status(500))
            } else {
                Ok(())
            }
        }

        async fn fetch_profile(&self, _token: &str) -> Result<Profile, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.unauthorized.load(Ordering::SeqCst) {
                Err(ApiError::Unauthorized)
            } else {
                Ok(self.profile.lock().unwrap().clone())
            }
        }

        async fn login(&self, _email: &str, _password: &str) -> Result<String, ApiError> {
            Ok("test-token".to_string())
        }

        async fn register(&self, _email: &str, _password: &str) -> Result<String, ApiError> {
            Ok("test-token".to_string())
        }
    }

    fn record() -> JobRecord {
        JobRecord::new(
            "Backend Engineer".to_string(),
            Some("Acme".to_string()),
            "...".to_string(),
            "https://indeed.com/job/123".to_string(),
        )
    }

    async fn coordinator(
        store: &Store,
        backend: FakeBackend,
    ) -> (Coordinator, mpsc::UnboundedReceiver<HostEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(
            store.clone(),
            Box::new(backend),
            "http://localhost:3000/job-applications",
            events_tx,
        )
        .await
        .unwrap();
        (coordinator, events_rx)
    }

    #[tokio::test]
    async fn capture_without_token_stays_local_and_notifies() {
        let store = Store::open_in_memory().unwrap();
        let backend = FakeBackend::default();
        let (mut coordinator, mut events) = coordinator(&store, backend.clone()).await;

        coordinator.handle(Action::JobScraped(record())).await;

        let jobs = store.scraped_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Backend Engineer");
        // No token, so no network call was attempted.
        assert_eq!(backend.pushes.load(Ordering::SeqCst), 0);
        // A capture notification was shown.
        match events.try_recv().unwrap() {
            HostEvent::ShowNotice(notice) => {
                assert_eq!(notice.title, "Job Captured");
                assert!(notice.actions.contains(&NoticeAction::ViewInDashboard));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn capture_with_token_pushes_to_backend() {
        let store = Store::open_in_memory().unwrap();
        store.set_auth_token("tok").await.unwrap();
        let backend = FakeBackend::default();
        let (mut coordinator, _events) = coordinator(&store, backend.clone()).await;

        coordinator.handle(Action::JobScraped(record())).await;
        assert_eq!(backend.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_push_keeps_record_local() {
        let store = Store::open_in_memory().unwrap();
        store.set_auth_token("tok").await.unwrap();
        let backend = FakeBackend::default();
        backend.fail_push.store(true, Ordering::SeqCst);
        let (mut coordinator, _events) = coordinator(&store, backend.clone()).await;

        coordinator.handle(Action::JobScraped(record())).await;

        assert_eq!(store.scraped_jobs().await.unwrap().len(), 1);
        // Not retried.
        assert_eq!(backend.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capture_notice_suppressed_when_notifications_disabled() {
        let store = Store::open_in_memory().unwrap();
        let settings = Settings {
            show_notifications: false,
            ..Default::default()
        };
        store.set_settings(&settings).await.unwrap();
        let (mut coordinator, mut events) = coordinator(&store, FakeBackend::default()).await;

        coordinator.handle(Action::JobScraped(record())).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn hydrates_existing_jobs_and_appends() {
        let store = Store::open_in_memory().unwrap();
        store.set_scraped_jobs(&[record()]).await.unwrap();
        let (mut coordinator, _events) = coordinator(&store, FakeBackend::default()).await;

        coordinator.handle(Action::JobScraped(record())).await;
        assert_eq!(store.scraped_jobs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn profile_from_memory_needs_no_storage_or_network() {
        let store = Store::open_in_memory().unwrap();
        let cached = Profile {
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        store.set_profile(&cached).await.unwrap();
        let backend = FakeBackend::default();
        let (mut coordinator, _events) = coordinator(&store, backend.clone()).await;

        // First resolution populates the in-memory layer from storage.
        assert_eq!(coordinator.resolve_profile().await, Some(cached.clone()));
        // Remove the persisted copy: a second resolution still succeeds,
        // proving it came from memory, and the network is never touched.
        store.clear_profile().await.unwrap();
        assert_eq!(coordinator.resolve_profile().await, Some(cached));
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn profile_from_persisted_cache_skips_network() {
        let store = Store::open_in_memory().unwrap();
        store.set_auth_token("tok").await.unwrap();
        store
            .set_profile(&Profile {
                email: Some("ada@example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let backend = FakeBackend::default();
        let (mut coordinator, _events) = coordinator(&store, backend.clone()).await;

        assert!(coordinator.resolve_profile().await.is_some());
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn profile_fetched_once_and_populates_both_layers() {
        let store = Store::open_in_memory().unwrap();
        store.set_auth_token("tok").await.unwrap();
        let backend = FakeBackend::default();
        *backend.profile.lock().unwrap() = Profile {
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        let (mut coordinator, _events) = coordinator(&store, backend.clone()).await;

        let resolved = coordinator.resolve_profile().await.unwrap();
        assert_eq!(resolved.email.as_deref(), Some("ada@example.com"));
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
        // Persisted layer was populated.
        assert!(store.profile().await.unwrap().is_some());
        // Second resolution hits the in-memory layer.
        assert!(coordinator.resolve_profile().await.is_some());
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_is_cleared_and_profile_unavailable() {
        let store = Store::open_in_memory().unwrap();
        store.set_auth_token("expired").await.unwrap();
        let backend = FakeBackend::default();
        backend.unauthorized.store(true, Ordering::SeqCst);
        let (mut coordinator, _events) = coordinator(&store, backend.clone()).await;

        assert!(coordinator.resolve_profile().await.is_none());
        assert!(store.auth_token().await.unwrap().is_none());
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);

        // Until a new login happens, resolution stays unavailable and no
        // further network call is made.
        assert!(coordinator.resolve_profile().await.is_none());
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_dashboard_opens_the_configured_tab() {
        let store = Store::open_in_memory().unwrap();
        let (mut coordinator, mut events) = coordinator(&store, FakeBackend::default()).await;

        coordinator.handle(Action::OpenDashboard).await;
        match events.try_recv().unwrap() {
            HostEvent::OpenTab(url) => {
                assert_eq!(url, "http://localhost:3000/job-applications")
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn end_to_end_capture_over_the_bus() {
        let store = Store::open_in_memory().unwrap();
        let backend = FakeBackend::default();
        let (coordinator, mut events) = coordinator(&store, backend.clone()).await;
        let (handle, rx) = crate::bus::channel();
        let run = tokio::spawn(coordinator.run(rx));

        assert!(handle.job_scraped(record()));
        // getProfile round-trips through the running coordinator; with no
        // token it resolves to None.
        assert!(handle.get_profile().await.is_none());

        drop(handle);
        run.await.unwrap();

        assert_eq!(store.scraped_jobs().await.unwrap().len(), 1);
        assert_eq!(backend.pushes.load(Ordering::SeqCst), 0);
        assert!(matches!(
            events.try_recv().unwrap(),
            HostEvent::ShowNotice(_)
        ));
    }
}
