pub mod enrich;
pub mod fetch;
pub mod reconcile;
pub mod snapshot;
pub mod tracked;
pub mod transitions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::MissedTickBehavior;

use crate::auth::Token;
use crate::error::Result;
use crate::gitlab::types::GitLabUser;
use crate::gitlab::GitLabClient;
use crate::notify::{NotificationSettings, NotificationSink};

pub use snapshot::MonitorSnapshot;
pub use tracked::TrackedPipeline;
pub use transitions::TransitionDetector;

/// Polling faster than this hammers the API for no benefit.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Look-back window for project activity and pipeline updates.
const ACTIVITY_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub base_url: String,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub credentials: Option<Credentials>,
    pub interval_secs: u64,
    pub notifications: NotificationSettings,
}

impl WatchSettings {
    /// The configured interval, clamped to the minimum.
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }
}

/// Drives poll cycles and owns all cross-cycle state.
///
/// One cycle runs fetch, reconciliation, enrichment and transition detection
/// as strictly sequenced fork-join phases; nothing is visible to consumers
/// until the whole cycle completes and the snapshot is swapped. At most one
/// cycle is in flight at a time, whether started by the timer or a manual
/// trigger.
pub struct Monitor {
    shared: Arc<Shared>,
    shutdown: Option<watch::Sender<()>>,
}

struct Shared {
    sink: Arc<dyn NotificationSink>,
    settings: RwLock<WatchSettings>,
    client: RwLock<Option<Arc<GitLabClient>>>,
    cycle: Mutex<CycleState>,
    snapshot: RwLock<MonitorSnapshot>,
    busy: AtomicBool,
}

/// State carried between cycles. Identity is fetched once and cached;
/// the detector is the only other cross-cycle memory.
#[derive(Default)]
struct CycleState {
    user: Option<GitLabUser>,
    detector: TransitionDetector,
}

impl Monitor {
    pub fn new(settings: WatchSettings, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                sink,
                settings: RwLock::new(settings),
                client: RwLock::new(None),
                cycle: Mutex::new(CycleState::default()),
                snapshot: RwLock::new(MonitorSnapshot::default()),
                busy: AtomicBool::new(false),
            }),
            shutdown: None,
        }
    }

    /// Builds the API client from current credentials and starts the timer,
    /// polling immediately. Without credentials no cycle ever starts and the
    /// snapshot reports "not configured".
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub async fn start(&mut self) -> Result<()> {
        if !self.connect().await? {
            return Ok(());
        }

        let interval = self.shared.settings.read().await.effective_interval();
        info!("Polling every {}s", interval.as_secs());

        let (tx, mut rx) = watch::channel(());
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = rx.changed() => break,
                    // The first tick completes immediately. A cycle started
                    // here is awaited outside the race, so shutdown never
                    // cancels it mid-flight.
                    _ = ticker.tick() => Shared::poll(&shared).await,
                }
            }
        });
        self.shutdown = Some(tx);

        Ok(())
    }

    /// Halts the timer. The last published snapshot stays untouched; a cycle
    /// already in flight runs to completion, only the next one is prevented.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    /// Stop, forget all cross-cycle memory, and start with new settings.
    /// Used after credential changes so no stale transition baselines leak
    /// across accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the new base URL is invalid.
    pub async fn restart(&mut self, settings: WatchSettings) -> Result<()> {
        self.stop();
        {
            let mut cycle = self.shared.cycle.lock().await;
            cycle.detector.clear();
            cycle.user = None;
        }
        *self.shared.settings.write().await = settings;
        self.start().await
    }

    /// Runs one cycle outside the timer's cadence. Skipped if a cycle is
    /// already in flight.
    pub fn trigger(&self) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            Shared::poll(&shared).await;
        });
    }

    /// Runs a single cycle to completion without starting the timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub async fn run_once(&mut self) -> Result<()> {
        if !self.connect().await? {
            return Ok(());
        }
        Shared::poll(&self.shared).await;
        Ok(())
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.shared.snapshot.read().await.clone()
    }

    /// Replaces the API client from current credentials. Returns false when
    /// credentials are absent. The old client instance is only dropped once
    /// any in-flight cycle using it finishes.
    async fn connect(&self) -> Result<bool> {
        let credentials = self.shared.settings.read().await.credentials.clone();

        let Some(credentials) = credentials else {
            let mut snapshot = self.shared.snapshot.write().await;
            snapshot.configured = false;
            snapshot.connected = false;
            snapshot.last_error = Some("Not configured".to_string());
            return Ok(false);
        };

        let client = GitLabClient::new(&credentials.base_url, &credentials.token)?;
        *self.shared.client.write().await = Some(Arc::new(client));

        let mut snapshot = self.shared.snapshot.write().await;
        snapshot.configured = true;
        Ok(true)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Releases the single-flight flag even when the cycle future is dropped,
/// so a torn-down cycle can never leave polling wedged.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    /// Single-flight entry point shared by the timer and the manual trigger.
    async fn poll(self: &Arc<Self>) {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("Cycle already in flight, skipping");
            return;
        }
        let _guard = CycleGuard(&self.busy);
        self.run_cycle().await;
    }

    async fn run_cycle(&self) {
        let client = self.client.read().await.clone();
        let Some(client) = client else {
            warn!("No API client configured, skipping cycle");
            return;
        };

        // Identity fetch is cycle-fatal; everything downstream needs the
        // username filter.
        let user = {
            let mut cycle = self.cycle.lock().await;
            match &cycle.user {
                Some(user) => user.clone(),
                None => match client.current_user().await {
                    Ok(user) => {
                        info!("Logged in as: {} ({})", user.name, user.username);
                        cycle.user = Some(user.clone());
                        user
                    }
                    Err(e) => {
                        drop(cycle);
                        self.mark_disconnected(e.to_string()).await;
                        return;
                    }
                },
            }
        };

        let cutoff = Utc::now() - chrono::Duration::hours(ACTIVITY_WINDOW_HOURS);

        // Project list is the other cycle-fatal fetch.
        let projects = match client.projects(cutoff).await {
            Ok(projects) => projects,
            Err(e) => {
                self.mark_disconnected(e.to_string()).await;
                return;
            }
        };
        debug!(
            "{} projects active in the last {ACTIVITY_WINDOW_HOURS}h",
            projects.len()
        );

        // Fork-join phases, each fully merged before the next starts.
        let mut tracked =
            fetch::fetch_tracked_pipelines(&client, &projects, &user.username, cutoff).await;
        reconcile::resolve_superseded(&client, &mut tracked).await;
        enrich::enrich_with_jobs(&client, &mut tracked).await;

        // Newest first; ids are the recency proxy since timestamps may tie.
        tracked.sort_by(|a, b| b.id().cmp(&a.id()));

        let transitions = self.cycle.lock().await.detector.observe(&tracked);
        let notifications = self.settings.read().await.notifications;
        transitions::dispatch(self.sink.as_ref(), &notifications, &transitions);

        let mut snapshot = self.snapshot.write().await;
        snapshot.tracked = tracked;
        snapshot.connected = true;
        snapshot.configured = true;
        snapshot.last_error = None;
        snapshot.last_refresh = Some(Utc::now());
    }

    /// Cycle-fatal failure: flag the disconnect but leave the previously
    /// published pipelines visible. Stale data beats no data.
    async fn mark_disconnected(&self, message: String) {
        warn!("Poll cycle failed: {message}");
        let mut snapshot = self.snapshot.write().await;
        snapshot.connected = false;
        snapshot.last_error = Some(message);
    }
}
