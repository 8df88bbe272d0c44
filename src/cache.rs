use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{JobRecord, Profile, Settings};

// Well-known storage keys.
pub const K_SCRAPED_JOBS: &str = "scrapedJobs";
pub const K_SETTINGS: &str = "settings";
pub const K_AUTH_TOKEN: &str = "authToken";
pub const K_USER_PROFILE: &str = "userProfile";

/// Durable process-wide key-value store. Values are JSON strings; every
/// operation is asynchronous and awaitable. Concurrent writers to the same
/// key race last-write-wins, which is acceptable here: writes are rare and
/// each corresponds to a single user-attributable action.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open cache at {}", path.display()))?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "snag") {
            Ok(proj_dirs.data_dir().join("snag.db"))
        } else {
            Ok(PathBuf::from("snag.db"))
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
            f(&guard)
        })
        .await
        .context("cache task panicked")?
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let result = conn.query_row("SELECT value FROM kv WHERE key = ?1", [&key], |row| {
                row.get(0)
            });
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", [&key])?;
            Ok(())
        })
        .await
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt cache value under {:?}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_raw(key, serde_json::to_string(value)?).await
    }

    // --- Typed helpers for the well-known keys ---

    pub async fn scraped_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.get(K_SCRAPED_JOBS).await?.unwrap_or_default())
    }

    pub async fn set_scraped_jobs(&self, jobs: &[JobRecord]) -> Result<()> {
        self.set(K_SCRAPED_JOBS, &jobs).await
    }

    pub async fn settings(&self) -> Result<Settings> {
        Ok(self.get(K_SETTINGS).await?.unwrap_or_default())
    }

    pub async fn set_settings(&self, settings: &Settings) -> Result<()> {
        self.set(K_SETTINGS, settings).await
    }

    pub async fn auth_token(&self) -> Result<Option<String>> {
        self.get(K_AUTH_TOKEN).await
    }

    pub async fn set_auth_token(&self, token: &str) -> Result<()> {
        self.set(K_AUTH_TOKEN, &token).await
    }

    pub async fn clear_auth_token(&self) -> Result<()> {
        self.remove(K_AUTH_TOKEN).await
    }

    pub async fn profile(&self) -> Result<Option<Profile>> {
        self.get(K_USER_PROFILE).await
    }

    pub async fn set_profile(&self, profile: &Profile) -> Result<()> {
        self.set(K_USER_PROFILE, profile).await
    }

    pub async fn clear_profile(&self) -> Result<()> {
        self.remove(K_USER_PROFILE).await
    }
}
