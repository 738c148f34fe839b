//! Input executor
//!
//! Carries out parsed sequences on the controller pool, one tokio task per
//! sequence. Each task walks its groups in order:
//!
//! ```text
//! group start ──► press every input (release for `-` inputs)
//!      │
//!      ├─ after each input's duration: release it unless held
//!      │
//! group end (longest duration) ──► next group
//!      │
//! sequence end or cancel ──► release every input the sequence touched
//! ```

use super::render;
use super::virtual_controller::ControllerPool;
use crate::console::ConsoleCapability;
use crate::parsing::{InputGroup, ParsedInput};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Sequence has no inputs")]
    EmptySequence,

    #[error("Sequence targets port {port} but only {count} controllers exist")]
    UnknownPort { port: u32, count: usize },
}

pub struct InputExecutor {
    pool: Arc<ControllerPool>,
    console: Arc<ConsoleCapability>,
    // Replaced after every cancel so later sequences start uncancelled.
    root: Mutex<CancellationToken>,
    running: Arc<AtomicUsize>,
}

/// Decrements the running count when a sequence task ends.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InputExecutor {
    pub fn new(pool: Arc<ControllerPool>, console: Arc<ConsoleCapability>) -> Self {
        Self {
            pool,
            console,
            root: Mutex::new(CancellationToken::new()),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn running_count(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts executing `groups` and returns the task running them.
    pub fn carry_out(&self, groups: Vec<InputGroup>) -> Result<JoinHandle<()>, ExecutorError> {
        if groups.iter().all(|group| group.is_empty()) {
            return Err(ExecutorError::EmptySequence);
        }
        if let Some(input) = groups
            .iter()
            .flatten()
            .find(|input| self.pool.get(input.controller_port).is_err())
        {
            return Err(ExecutorError::UnknownPort {
                port: input.controller_port,
                count: self.pool.len(),
            });
        }

        let cancel = self.root.lock().child_token();
        self.running.fetch_add(1, Ordering::SeqCst);
        let guard = RunningGuard(self.running.clone());
        let pool = self.pool.clone();
        let console = self.console.clone();

        debug!("Carrying out sequence of {} groups", groups.len());
        Ok(tokio::spawn(async move {
            let _guard = guard;
            run_sequence(&pool, &console, &groups, &cancel).await;
        }))
    }

    /// Stops every in-flight sequence. Their inputs are released.
    pub fn cancel_running(&self) {
        let mut root = self.root.lock();
        root.cancel();
        *root = CancellationToken::new();
        info!("Cancelled {} running input sequences", self.running_count());
    }
}

fn press(pool: &ControllerPool, console: &ConsoleCapability, input: &ParsedInput) {
    if let Ok(controller) = pool.get(input.controller_port) {
        if input.release {
            render::release_input(controller.as_ref(), console, input);
        } else {
            render::press_input(controller.as_ref(), console, input);
        }
    }
}

fn release(pool: &ControllerPool, console: &ConsoleCapability, input: &ParsedInput) {
    if let Ok(controller) = pool.get(input.controller_port) {
        render::release_input(controller.as_ref(), console, input);
    }
}

fn duration_of(input: &ParsedInput) -> Duration {
    Duration::from_millis(u64::try_from(input.duration_ms).unwrap_or(0))
}

async fn run_sequence(
    pool: &ControllerPool,
    console: &ConsoleCapability,
    groups: &[InputGroup],
    cancel: &CancellationToken,
) {
    'groups: for group in groups {
        // Press the whole group at once
        let started = Instant::now();
        for input in group {
            if !console.is_wait(&input.name) {
                press(pool, console, input);
            }
        }

        // Release each input when its duration is up, shortest first
        let mut timeline: Vec<&ParsedInput> = group.iter().collect();
        timeline.sort_by_key(|input| input.duration_ms);

        for input in timeline {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Input sequence cancelled");
                    break 'groups;
                }
                _ = sleep_until(started + duration_of(input)) => {}
            }
            if !input.hold && !console.is_wait(&input.name) {
                release(pool, console, input);
            }
        }
    }

    // Nothing stays held once the sequence is over or cancelled
    for input in groups.iter().flatten() {
        if !console.is_wait(&input.name) {
            release(pool, console, input);
        }
    }
    debug!("Input sequence finished");
}
