use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::connectivity::ConnectivityProbe;
use super::errors::{CrlError, CrlResult};
use super::source::CrlSource;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Callback invoked with the number of sources after a successful refresh
pub type OnComplete = Box<dyn FnOnce(usize) + Send + 'static>;

/// Timing of CRL refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlSettings {
    /// Period of automatic refreshes
    pub refresh_interval: Duration,
    /// Age after which a fetched CRL is considered stale
    pub staleness_threshold: Duration,
    /// Period of connectivity checks after a failed refresh
    pub reconnect_poll: Duration,
}

impl Default for CrlSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(86_400),
            staleness_threshold: Duration::from_secs(864_000),
            reconnect_poll: Duration::from_secs(600),
        }
    }
}

/// What the manager is currently doing in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    AutoRefreshing,
    WaitingForConnectivity,
}

/// Result of a single [`CrlManager::refresh_now`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every source was fetched
    Completed(usize),
    /// A source could not be fetched; the manager now waits for connectivity
    Failed,
    /// Another refresh was already running
    Skipped,
}

/// Broadcast after every successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlUpdated {
    pub source_count: usize,
}

#[derive(Debug)]
struct Schedule {
    refresh_interval: Duration,
    auto_refresh: bool,
    refresh_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
}

impl Schedule {
    fn cancel_refresh_timer(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }

    fn cancel_reconnect_wait(&mut self) {
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
    }
}

struct Inner {
    settings: CrlSettings,
    probe: Arc<dyn ConnectivityProbe>,
    sources: RwLock<Vec<Arc<CrlSource>>>,
    schedule: Mutex<Schedule>,
    refreshing: AtomicBool,
    updates: broadcast::Sender<CrlUpdated>,
}

impl Inner {
    fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sources(&self) -> Vec<Arc<CrlSource>> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let schedule = self
            .schedule
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        schedule.cancel_refresh_timer();
        schedule.cancel_reconnect_wait();
    }
}

/// Keeps a set of CRL sources up to date.
///
/// The manager is an explicit object owned by the application; clones share
/// the same sources and timers. Background work runs on the Tokio runtime,
/// so the scheduling methods must be called from within one.
///
/// Only one refresh runs at a time. A refresh requested while another is in
/// flight is skipped rather than queued.
#[derive(Clone)]
pub struct CrlManager {
    inner: Arc<Inner>,
}

impl CrlManager {
    pub fn new(settings: CrlSettings, probe: Arc<dyn ConnectivityProbe>) -> Self {
        let (updates, _) = broadcast::channel(16);
        let schedule = Schedule {
            refresh_interval: settings.refresh_interval,
            auto_refresh: false,
            refresh_task: None,
            reconnect_task: None,
        };

        Self {
            inner: Arc::new(Inner {
                settings,
                probe,
                sources: RwLock::new(Vec::new()),
                schedule: Mutex::new(schedule),
                refreshing: AtomicBool::new(false),
                updates,
            }),
        }
    }

    /// Replace the held sources.
    ///
    /// Pending timers are cancelled and any wait for connectivity is
    /// abandoned. If automatic refresh is active its timer starts over.
    pub fn setup(&self, sources: Vec<CrlSource>) {
        let count = sources.len();
        *self
            .inner
            .sources
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sources.into_iter().map(Arc::new).collect();

        let mut schedule = self.inner.schedule();
        schedule.cancel_reconnect_wait();
        schedule.cancel_refresh_timer();
        if schedule.auto_refresh {
            schedule.refresh_task = Some(self.spawn_refresh_timer(schedule.refresh_interval));
        }
        info!("Configured {count} CRL sources");
    }

    pub fn sources(&self) -> Vec<Arc<CrlSource>> {
        self.inner.sources()
    }

    /// Bytes of every source that currently holds a CRL, in source order
    pub fn current_crls(&self) -> Vec<Vec<u8>> {
        self.inner
            .sources()
            .iter()
            .filter_map(|source| source.data())
            .collect()
    }

    pub fn settings(&self) -> CrlSettings {
        let mut settings = self.inner.settings;
        settings.refresh_interval = self.inner.schedule().refresh_interval;
        settings
    }

    pub fn state(&self) -> RefreshState {
        let schedule = self.inner.schedule();
        if schedule.reconnect_task.is_some() {
            RefreshState::WaitingForConnectivity
        } else if schedule.auto_refresh {
            RefreshState::AutoRefreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Receive a [`CrlUpdated`] after each successful refresh
    pub fn subscribe(&self) -> broadcast::Receiver<CrlUpdated> {
        self.inner.updates.subscribe()
    }

    /// Whether any source was never fetched or was fetched too long ago
    pub fn is_refresh_overdue(&self) -> bool {
        let now = Utc::now();
        let threshold = self.inner.settings.staleness_threshold;
        self.inner
            .sources()
            .iter()
            .any(|source| source.is_overdue(now, threshold))
    }

    /// Fetch every source, one after the other, in the order given to
    /// [`setup`](Self::setup).
    ///
    /// If any fetch fails the remaining sources are not attempted, the
    /// refresh timer stops and the manager waits for connectivity.
    /// `on_complete` only runs when every source was fetched.
    ///
    /// # Errors
    /// Returns [`CrlError::NoSourcesConfigured`] if no sources are held.
    pub async fn refresh_now(&self, on_complete: Option<OnComplete>) -> CrlResult<RefreshOutcome> {
        let sources = self.inner.sources();
        if sources.is_empty() {
            return Err(CrlError::NoSourcesConfigured);
        }

        let Some(_guard) = RefreshGuard::acquire(&self.inner.refreshing) else {
            debug!("CRL refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        for source in &sources {
            if !source.fetch().await {
                warn!("CRL refresh failed, waiting for connectivity");
                self.enter_reconnect_wait();
                return Ok(RefreshOutcome::Failed);
            }
        }

        let count = sources.len();
        info!("Refreshed {count} CRL sources");
        if let Some(on_complete) = on_complete {
            on_complete(count);
        }
        // No receivers is fine
        let _ = self.inner.updates.send(CrlUpdated {
            source_count: count,
        });

        Ok(RefreshOutcome::Completed(count))
    }

    /// Refresh every `interval` (or the current interval), starting one
    /// full interval from now.
    pub fn start_auto_refresh(&self, interval: Option<Duration>) {
        let mut schedule = self.inner.schedule();
        if let Some(interval) = interval {
            schedule.refresh_interval = interval;
        }
        schedule.auto_refresh = true;
        schedule.cancel_refresh_timer();
        schedule.refresh_task = Some(self.spawn_refresh_timer(schedule.refresh_interval));
        info!(
            "Automatic CRL refresh every {}s",
            schedule.refresh_interval.as_secs()
        );
    }

    pub fn stop_auto_refresh(&self) {
        let mut schedule = self.inner.schedule();
        schedule.auto_refresh = false;
        schedule.cancel_refresh_timer();
        info!("Automatic CRL refresh stopped");
    }

    fn enter_reconnect_wait(&self) {
        let mut schedule = self.inner.schedule();
        schedule.cancel_refresh_timer();
        if schedule.reconnect_task.is_none() {
            schedule.reconnect_task = Some(self.spawn_reconnect_wait());
            info!("Waiting for connectivity before refreshing CRLs");
        }
    }

    /// Returns false if this wait was abandoned in the meantime.
    fn leave_reconnect_wait(&self) -> bool {
        let mut schedule = self.inner.schedule();
        let current = tokio::task::id();
        if schedule.reconnect_task.as_ref().map(JoinHandle::id) != Some(current) {
            return false;
        }
        // Detach rather than abort: this is the running task
        drop(schedule.reconnect_task.take());

        if schedule.auto_refresh {
            schedule.cancel_refresh_timer();
            schedule.refresh_task = Some(self.spawn_refresh_timer(schedule.refresh_interval));
        }
        true
    }

    fn spawn_refresh_timer(&self, period: Duration) -> JoinHandle<()> {
        let period = period.max(MIN_PERIOD);
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                let Some(manager) = upgrade(&inner) else {
                    break;
                };
                debug!("Running scheduled CRL refresh");

                // Cancelling the timer must not interrupt a refresh
                tokio::spawn(async move {
                    if let Err(e) = manager.refresh_now(None).await {
                        warn!("Scheduled CRL refresh failed: {e}");
                    }
                });
            }
        })
    }

    fn spawn_reconnect_wait(&self) -> JoinHandle<()> {
        let period = self.inner.settings.reconnect_poll.max(MIN_PERIOD);
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                let Some(manager) = upgrade(&inner) else {
                    break;
                };
                if !manager.inner.probe.is_connected().await {
                    debug!("Still offline, CRL refresh postponed");
                    continue;
                }
                if !manager.leave_reconnect_wait() {
                    break;
                }

                info!("Connectivity restored, refreshing CRLs");
                if let Err(e) = manager.refresh_now(None).await {
                    warn!("CRL refresh after reconnect failed: {e}");
                }
                break;
            }
        })
    }
}

fn upgrade(inner: &Weak<Inner>) -> Option<CrlManager> {
    inner.upgrade().map(|inner| CrlManager { inner })
}

struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crl::connectivity::MockConnectivityProbe;

    fn manager() -> CrlManager {
        CrlManager::new(CrlSettings::default(), Arc::new(MockConnectivityProbe::new()))
    }

    #[tokio::test]
    async fn test_refresh_without_sources() {
        let result = manager().refresh_now(None).await;
        assert!(matches!(result, Err(CrlError::NoSourcesConfigured)));
    }

    #[tokio::test]
    async fn test_static_sources_refresh() {
        let manager = manager();
        manager.setup(vec![
            CrlSource::from_bytes(vec![1]),
            CrlSource::from_bytes(vec![2]),
        ]);
        let mut updates = manager.subscribe();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let outcome = manager
            .refresh_now(Some(Box::new(move |count| {
                let _ = tx.send(count);
            })))
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::Completed(2));
        assert_eq!(rx.await.unwrap(), 2);
        assert_eq!(updates.recv().await.unwrap(), CrlUpdated { source_count: 2 });
        assert_eq!(manager.current_crls(), vec![vec![1], vec![2]]);
        assert_eq!(manager.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let manager = manager();
        manager.setup(vec![CrlSource::from_bytes(vec![1])]);

        let _guard = RefreshGuard::acquire(&manager.inner.refreshing).unwrap();
        let outcome = manager.refresh_now(None).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_static_sources_are_not_overdue() {
        let manager = manager();
        assert!(!manager.is_refresh_overdue());

        manager.setup(vec![CrlSource::from_bytes(vec![1])]);
        assert!(!manager.is_refresh_overdue());
    }

    #[tokio::test]
    async fn test_auto_refresh_state() {
        let manager = manager();
        manager.start_auto_refresh(Some(Duration::from_secs(60)));
        assert_eq!(manager.state(), RefreshState::AutoRefreshing);
        assert_eq!(manager.settings().refresh_interval, Duration::from_secs(60));

        manager.stop_auto_refresh();
        assert_eq!(manager.state(), RefreshState::Idle);
    }

    #[test]
    fn test_refresh_guard_releases() {
        let flag = AtomicBool::new(false);
        {
            let _guard = RefreshGuard::acquire(&flag).unwrap();
            assert!(RefreshGuard::acquire(&flag).is_none());
        }
        assert!(RefreshGuard::acquire(&flag).is_some());
    }
}
