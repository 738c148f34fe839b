//! Controller subsystem for virtual gamepads
//!
//! 1. [`render`] - parsed inputs to button/axis calls
//! 2. [`virtual_controller`] - the controller capability and the per-port pool
//! 3. [`tracker`] - pending and committed controller state
//! 4. [`device_tick`] - periodic commit and hand-off to a device backend
//! 5. [`executor`] - timed execution of whole sequences
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────── press / release ────────────┐
//!                  │                                          ▼
//! Sequence ──► Executor ──► render ──► TrackedController ──► Tracker (pending)
//!                                                             │ commit
//!                                      DeviceBackend ◄── DeviceTick (committed)
//! ```

pub mod device_tick;
pub mod executor;
pub mod render;
pub mod tracker;
pub mod virtual_controller;

pub use device_tick::{
    BackendError, DeviceBackend, DeviceTick, LogBackend, TickError, TickHandle, TickSettings,
    TickStats,
};
pub use executor::{ExecutorError, InputExecutor};
pub use tracker::{ControllerSnapshot, ControllerStateTracker, InputObserver, InputState, InputTransition};
pub use virtual_controller::{ControllerPool, TrackedController, VirtualController};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No controller on port {port}, the pool has {count}")]
    UnknownPort { port: u32, count: usize },

    #[error("Tick error: {0}")]
    Tick(#[from] TickError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
}
