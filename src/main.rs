mod bus;
mod cache;
mod coordinator;
mod fill;
mod models;
mod notify;
mod popup;
mod scrape;
mod sites;
mod sync;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

use cache::Store;
use coordinator::{Coordinator, HostEvent};
use fill::FormPage;
use models::{DEFAULT_DASHBOARD_URL, Settings};
use notify::{Notice, NoticeSink, TerminalSink};
use scrape::{CaptureState, PageWatcher};
use sites::SiteRegistry;
use sync::{Backend, HttpBackend};

#[derive(Parser)]
#[command(name = "snag")]
#[command(about = "Capture job postings and autofill applications with a stored profile")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local cache
    Init,

    /// Capture a job posting from a page
    Capture {
        /// The job posting's URL
        url: String,

        /// Read the page from a saved HTML file instead of fetching it
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Keep re-reading the page until the posting appears
        #[arg(short, long)]
        watch: bool,

        /// Seconds between re-reads while watching
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Give up after this many re-reads
        #[arg(long, default_value = "20")]
        max_attempts: u32,
    },

    /// Fill an application form with the cached profile
    Fill {
        /// The application form's URL
        url: String,

        /// Read the page from a saved HTML file instead of fetching it
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show recently captured jobs
    Recent {
        /// Number of jobs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show sign-in state and the latest captures
    Status,

    /// Create a backend account and sign in
    Register {
        /// Account email
        email: String,

        /// Path to a file holding the account password
        #[arg(short, long, default_value = "~/.snag.password.txt")]
        password_file: String,
    },

    /// Sign in to the backend
    Login {
        /// Account email
        email: String,

        /// Path to a file holding the account password
        #[arg(short, long, default_value = "~/.snag.password.txt")]
        password_file: String,
    },

    /// Sign out and clear cached credentials
    Logout,

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Open the dashboard
    Dashboard,

    /// Deliver a raw message envelope to the background coordinator
    Send {
        /// JSON envelope, e.g. '{"action": "openDashboard"}'
        message: String,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,

    /// Change one or more settings
    Set {
        #[arg(long)]
        autofill: Option<bool>,

        #[arg(long)]
        scraping: Option<bool>,

        #[arg(long)]
        notifications: Option<bool>,

        #[arg(long)]
        api_url: Option<String>,
    },

    /// Reset settings to defaults
    Reset,
}

/// A running background coordinator plus the task draining its host events
/// to the terminal. Dropping the bus handle shuts the coordinator down.
struct Session {
    handle: bus::BusHandle,
    run: tokio::task::JoinHandle<()>,
    drain: tokio::task::JoinHandle<()>,
}

async fn start_session(store: &Store) -> Result<Session> {
    let settings = store.settings().await?;
    let backend = Box::new(HttpBackend::new(api_url(&settings))?);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let coordinator =
        Coordinator::new(store.clone(), backend, dashboard_url(), events_tx).await?;
    let (handle, rx) = bus::channel();
    let run = tokio::spawn(coordinator.run(rx));
    let drain = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                HostEvent::ShowNotice(notice) => TerminalSink.show(notice),
                HostEvent::OpenTab(url) => println!("Opening {}", url),
            }
        }
    });
    Ok(Session { handle, run, drain })
}

impl Session {
    async fn shutdown(self) -> Result<()> {
        let Session { handle, run, drain } = self;
        drop(handle);
        run.await?;
        drain.await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let _store = Store::open()?;
            println!("Cache initialized at {}", Store::default_path()?.display());
        }

        Commands::Capture {
            url,
            file,
            watch,
            interval,
            max_attempts,
        } => {
            let store = Store::open()?;
            let settings = store.settings().await?;
            if !settings.enable_job_scraping {
                println!("Job scraping is disabled in settings.");
                return Ok(());
            }

            let registry = SiteRegistry::builtin()?;
            let host = hostname(&url)?;
            let Some(site) = registry.resolve(&host) else {
                // Unsupported site is a no-op, not an error.
                println!("No site configuration for {}; nothing captured.", host);
                return Ok(());
            };

            let client = reqwest::Client::new();
            let mut watcher =
                PageWatcher::new(site, url.as_str()).with_max_attempts(max_attempts);
            let html = load_page(&client, &url, file.as_ref()).await?;
            let mut captured = watcher.on_load(&html);

            if captured.is_none() && watch {
                println!("Required fields missing, watching for content...");
                let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
                ticker.tick().await; // the first tick completes immediately
                while watcher.is_observing() {
                    ticker.tick().await;
                    let html = load_page(&client, &url, file.as_ref()).await?;
                    if let Some(record) = watcher.on_mutation(&html) {
                        captured = Some(record);
                    }
                }
            }

            match captured {
                Some(record) => {
                    println!(
                        "Captured \"{}\" at {}",
                        record.title,
                        record.company.as_deref().unwrap_or("Unknown")
                    );
                    let session = start_session(&store).await?;
                    session.handle.job_scraped(record);
                    session.shutdown().await?;
                }
                None if watcher.state() == CaptureState::Exhausted => {
                    println!("Gave up waiting; the posting never appeared.")
                }
                None => println!("Could not extract the job posting from this page."),
            }
        }

        Commands::Fill { url, file } => {
            let store = Store::open()?;
            let settings = store.settings().await?;
            if !settings.enable_autofill {
                println!("Autofill is disabled in settings.");
                return Ok(());
            }

            let registry = SiteRegistry::builtin()?;
            let host = hostname(&url)?;
            let Some(site) = registry.resolve(&host) else {
                println!("No site configuration for {}; nothing to fill.", host);
                return Ok(());
            };

            let client = reqwest::Client::new();
            let html = load_page(&client, &url, file.as_ref()).await?;

            let session = start_session(&store).await?;
            match session.handle.get_profile().await {
                Some(profile) => {
                    let mut page = FormPage::parse(&html, site);
                    let filled = fill::fill(&mut page, &profile);
                    if filled > 0 {
                        if settings.show_notifications {
                            TerminalSink.show(Notice::filled(filled));
                        }
                        for field in page.fields.iter().filter(|f| !f.events.is_empty()) {
                            println!("  {:<14} {}", field.slot.label(), truncate(&field.value, 48));
                        }
                    } else {
                        println!("No matching form fields on this page.");
                    }
                }
                None => println!("No profile data available; sign in first."),
            }
            session.shutdown().await?;
        }

        Commands::Recent { limit } => {
            let store = Store::open()?;
            let jobs = popup::recent_jobs(&store, limit).await?;
            if jobs.is_empty() {
                println!("No jobs captured yet.");
            } else {
                println!("{:<20} {:<32} {:<20} URL", "CAPTURED", "TITLE", "COMPANY");
                println!("{}", "-".repeat(90));
                for job in jobs {
                    println!(
                        "{:<20} {:<32} {:<20} {}",
                        job.captured_at.format("%Y-%m-%d %H:%M"),
                        truncate(&job.title, 30),
                        truncate(job.company.as_deref().unwrap_or("-"), 18),
                        job.source_url
                    );
                }
            }
        }

        Commands::Status => {
            let store = Store::open()?;
            let status = popup::auth_status(&store).await?;
            if status.signed_in() {
                let email = status
                    .profile
                    .as_ref()
                    .and_then(|p| p.email.as_deref())
                    .unwrap_or("(no email on profile)");
                println!("Signed in as {}.", email);
            } else if status.token_present {
                println!("Signed in, profile not cached yet.");
            } else {
                println!("Not signed in.");
            }

            let jobs = popup::recent_jobs(&store, popup::RECENT_JOBS_SHOWN).await?;
            if jobs.is_empty() {
                println!("No jobs captured yet.");
            } else {
                println!("Latest captures:");
                for job in jobs {
                    println!(
                        "  {} at {} ({})",
                        truncate(&job.title, 40),
                        job.company.as_deref().unwrap_or("Unknown"),
                        job.captured_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        Commands::Register {
            email,
            password_file,
        } => {
            let store = Store::open()?;
            let settings = store.settings().await?;
            let password = read_password(&password_file)?;

            let backend = HttpBackend::new(api_url(&settings))?;
            let token = backend.register(&email, password.trim()).await?;
            store.set_auth_token(&token).await?;
            println!("Registered and signed in as {}.", email);
        }

        Commands::Login {
            email,
            password_file,
        } => {
            let store = Store::open()?;
            let settings = store.settings().await?;
            let password = read_password(&password_file)?;

            let backend = HttpBackend::new(api_url(&settings))?;
            let token = backend.login(&email, password.trim()).await?;
            store.set_auth_token(&token).await?;
            println!("Signed in as {}.", email);

            match backend.fetch_profile(&token).await {
                Ok(profile) => {
                    store.set_profile(&profile).await?;
                    println!("Profile cached for autofill.");
                }
                Err(e) => warn!(error = %e, "could not fetch profile after login"),
            }
        }

        Commands::Logout => {
            let store = Store::open()?;
            popup::sign_out(&store).await?;
            println!("Signed out; cached profile cleared.");
        }

        Commands::Settings { command } => {
            let store = Store::open()?;
            match command {
                SettingsCommands::Show => {
                    let settings = popup::load_settings(&store).await?;
                    print_settings(&settings);
                }
                SettingsCommands::Set {
                    autofill,
                    scraping,
                    notifications,
                    api_url,
                } => {
                    let mut settings = popup::load_settings(&store).await?;
                    if let Some(v) = autofill {
                        settings.enable_autofill = v;
                    }
                    if let Some(v) = scraping {
                        settings.enable_job_scraping = v;
                    }
                    if let Some(v) = notifications {
                        settings.show_notifications = v;
                    }
                    if let Some(v) = api_url {
                        settings.api_url = v.trim().to_string();
                    }
                    popup::save_settings(&store, &settings).await?;
                    println!("Settings saved.");
                    print_settings(&settings);
                }
                SettingsCommands::Reset => {
                    let settings = popup::reset_settings(&store).await?;
                    println!("Settings reset to defaults.");
                    print_settings(&settings);
                }
            }
        }

        Commands::Dashboard => {
            let store = Store::open()?;
            let session = start_session(&store).await?;
            session.handle.open_dashboard();
            session.shutdown().await?;
        }

        Commands::Send { message } => {
            let store = Store::open()?;
            let envelope: bus::Envelope =
                serde_json::from_str(&message).context("Invalid message envelope")?;
            let session = start_session(&store).await?;
            match session.handle.deliver(envelope).await {
                Some(response) => println!("{}", response),
                None => println!("(no handler for that action)"),
            }
            session.shutdown().await?;
        }
    }

    Ok(())
}

/// API base URL: environment override, then persisted settings.
fn api_url(settings: &Settings) -> String {
    std::env::var("SNAG_API_URL").unwrap_or_else(|_| settings.api_url.clone())
}

fn dashboard_url() -> String {
    std::env::var("SNAG_DASHBOARD_URL").unwrap_or_else(|_| DEFAULT_DASHBOARD_URL.to_string())
}

fn hostname(page_url: &str) -> Result<String> {
    let parsed =
        Url::parse(page_url).with_context(|| format!("Invalid URL: {}", page_url))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("URL has no hostname: {}", page_url))
}

async fn load_page(
    client: &reqwest::Client,
    page_url: &str,
    file: Option<&PathBuf>,
) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page file: {}", path.display())),
        None => {
            let response = client
                .get(page_url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .with_context(|| format!("Failed to fetch {}", page_url))?;
            Ok(response.text().await?)
        }
    }
}

fn read_password(password_file: &str) -> Result<String> {
    // Expand ~ in path
    let password_path = if password_file.starts_with("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{}/{}", home, &password_file[2..]))
    } else {
        PathBuf::from(password_file)
    };
    std::fs::read_to_string(&password_path)
        .with_context(|| format!("Failed to read password file: {}", password_path.display()))
}

fn print_settings(settings: &Settings) {
    println!("  autofill:       {}", settings.enable_autofill);
    println!("  job scraping:   {}", settings.enable_job_scraping);
    println!("  notifications:  {}", settings.show_notifications);
    println!("  api url:        {}", settings.api_url);
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
