//! Device tick consumer
//!
//! The single consumer of every [`ControllerStateTracker`]. Each tick walks a
//! small state machine:
//!
//! ```text
//! Idle ──commit_all──► Committed(CommitBatch) ──apply──► Applied ──finish──► Idle
//! ```
//!
//! Only ports whose committed state changed since the previous tick are
//! handed to the [`DeviceBackend`]. A port the backend fails on is retried on
//! the next tick.
//!
//! [`ControllerStateTracker`]: super::tracker::ControllerStateTracker

use super::tracker::ControllerSnapshot;
use super::virtual_controller::ControllerPool;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickSettings {
    pub tick_interval_ms: u64,
    pub stats_interval_secs: i64,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            stats_interval_secs: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend {backend} failed on port {port}: {reason}")]
    ApplyFailed {
        backend: String,
        port: u32,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error("Tick task failed: {0}")]
    Join(String),
}

/// Drives real hardware from committed controller snapshots.
pub trait DeviceBackend: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        port: u32,
        previous: Option<&ControllerSnapshot>,
        current: &ControllerSnapshot,
    ) -> Result<(), BackendError>;
}

/// Logs what changed on each port instead of touching a device.
pub struct LogBackend;

impl DeviceBackend for LogBackend {
    fn name(&self) -> &str {
        "log"
    }

    fn apply(
        &self,
        port: u32,
        previous: Option<&ControllerSnapshot>,
        current: &ControllerSnapshot,
    ) -> Result<(), BackendError> {
        let before = previous.map(|s| s.pressed_inputs()).unwrap_or_default();
        let after = current.pressed_inputs();

        let pressed: Vec<&String> = after.iter().filter(|n| !before.contains(n)).collect();
        let released: Vec<&String> = before.iter().filter(|n| !after.contains(n)).collect();
        if !pressed.is_empty() || !released.is_empty() {
            info!(
                "Port {}: pressed {:?}, released {:?}",
                port + 1,
                pressed,
                released
            );
        }
        debug!(
            "Port {} generation {}: buttons {:?}, axes {:?}",
            port + 1,
            current.generation,
            current.pressed_buttons(),
            current.axes
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CommitBatch {
    pub snapshots: Vec<Arc<ControllerSnapshot>>,
}

#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub ticks: u64,
    pub changed_ports: u64,
    pub failed_ports: u64,
    pub last_tick: Option<DateTime<Local>>,
}

#[state]
#[derive(Debug, Clone)]
pub enum TickState {
    Idle,
    Committed(CommitBatch),
    Applied,
}

#[machine]
pub struct DeviceTick<S: TickState> {
    pool: Arc<ControllerPool>,
    backend: Arc<dyn DeviceBackend>,
    settings: TickSettings,
    // Last snapshot handed to the backend, by port.
    last_applied: Vec<Option<Arc<ControllerSnapshot>>>,
    changed_ports: usize,
    failures: Vec<BackendError>,
}

impl<S: TickState> DeviceTick<S> {
    pub fn settings(&self) -> &TickSettings {
        &self.settings
    }
}

impl DeviceTick<Idle> {
    pub fn create(
        pool: Arc<ControllerPool>,
        backend: Arc<dyn DeviceBackend>,
        settings: Option<TickSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!(
            "Creating device tick for {} ports with backend {} and settings: {:?}",
            pool.len(),
            backend.name(),
            settings
        );

        let last_applied = vec![None; pool.len()];
        Self::new(pool, backend, settings, last_applied, 0, Vec::new())
    }

    /// Commits every tracker in the pool.
    pub fn commit_all(self) -> DeviceTick<Committed> {
        let snapshots: Vec<_> = self
            .pool
            .iter()
            .map(|controller| controller.tracker().commit())
            .collect();

        self.transition_with(CommitBatch { snapshots })
    }
}

impl DeviceTick<Committed> {
    /// Hands every changed snapshot to the backend. Ports the backend fails
    /// on keep their previous snapshot and are collected as failures.
    pub fn apply(mut self) -> DeviceTick<Applied> {
        let snapshots = self
            .get_state_data()
            .map(|batch| batch.snapshots.clone())
            .unwrap_or_default();

        self.changed_ports = 0;
        self.failures.clear();
        for (index, snapshot) in snapshots.into_iter().enumerate() {
            // Skip ports the backend already shows in this state
            let previous = self.last_applied.get(index).cloned().flatten();
            if previous
                .as_ref()
                .is_some_and(|previous| previous.same_state_as(&snapshot))
            {
                continue;
            }

            let port = u32::try_from(index).unwrap_or(u32::MAX);
            if let Err(e) = self.backend.apply(port, previous.as_deref(), &snapshot) {
                self.failures.push(e);
                continue;
            }
            self.changed_ports += 1;

            // Remember what the device now shows
            if let Some(slot) = self.last_applied.get_mut(index) {
                *slot = Some(snapshot);
            }
        }

        self.transition()
    }
}

impl DeviceTick<Applied> {
    pub fn changed_ports(&self) -> usize {
        self.changed_ports
    }

    pub fn failures(&self) -> &[BackendError] {
        &self.failures
    }

    pub fn finish(self) -> DeviceTick<Idle> {
        self.transition()
    }
}

/// Runs the device tick in a tokio task until shut down.
pub struct TickHandle {
    cancel: CancellationToken,
    stats: watch::Receiver<TickStats>,
    task: JoinHandle<()>,
}

impl TickHandle {
    pub fn spawn(
        pool: Arc<ControllerPool>,
        backend: Arc<dyn DeviceBackend>,
        settings: Option<TickSettings>,
    ) -> Self {
        let tick = DeviceTick::create(pool, backend, settings);
        let cancel = CancellationToken::new();
        let (stats_sender, stats) = watch::channel(TickStats::default());

        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            info!("Device tick task started");
            run_tick_loop(tick, loop_cancel, stats_sender).await;
            info!("Device tick task finished");
        });

        Self {
            cancel,
            stats,
            task,
        }
    }

    pub fn stats(&self) -> TickStats {
        self.stats.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TickStats> {
        self.stats.clone()
    }

    pub async fn shutdown(self) -> Result<(), TickError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| TickError::Join(e.to_string()))
    }
}

async fn run_tick_loop(
    mut tick: DeviceTick<Idle>,
    cancel: CancellationToken,
    stats_sender: watch::Sender<TickStats>,
) {
    let settings = tick.settings().clone();
    info!(
        "Starting device tick loop with {}ms interval",
        settings.tick_interval_ms
    );

    let mut interval_timer = tokio::time::interval(tokio::time::Duration::from_millis(
        settings.tick_interval_ms.max(1),
    ));
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut ticks: u64 = 0;
    let mut changes: u64 = 0;
    let mut failures: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(settings.stats_interval_secs);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Device tick cancelled");
                return;
            }
            _ = interval_timer.tick() => {}
        }

        let applied = tick.commit_all().apply();
        let changed = applied.changed_ports() as u64;
        let failed = applied.failures().len() as u64;
        // Failed ports stay pending and are retried next tick
        for e in applied.failures() {
            error!("Device tick: {}", e);
        }
        tick = applied.finish();

        // Update running stats
        ticks += 1;
        changes += changed;
        failures += failed;
        stats_sender.send_modify(|stats| {
            stats.ticks += 1;
            stats.changed_ports += changed;
            stats.failed_ports += failed;
            stats.last_tick = Some(Local::now());
        });

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
            info!(
                "Device tick stats: {} ticks, {} port updates, {} failed in {} seconds ({:.2} ticks/sec)",
                ticks,
                changes,
                failures,
                elapsed_seconds,
                ticks as f64 / elapsed_seconds as f64
            );
            ticks = 0;
            changes = 0;
            failures = 0;
            last_stats_time = now;
        }
    }
}
