use super::tracker::{ControllerStateTracker, InputState};
use super::ControllerError;
use crate::console::Axis;
use std::sync::Arc;
use tracing::{debug, info};

/// What a renderer can do to one virtual controller.
///
/// Implementations only record intent. Hardware is driven from committed
/// snapshots by the device tick.
pub trait VirtualController: Send + Sync {
    fn port(&self) -> u32;

    fn press_button(&self, id: u32);
    fn release_button(&self, id: u32);

    /// Centered axis pushed toward its min or max end.
    fn press_axis(&self, axis: Axis, min: bool, percent: f64);
    fn release_axis(&self, axis: Axis);

    /// Zero-based axis such as an analog trigger.
    fn press_absolute_axis(&self, axis: Axis, percent: f64);
    fn release_absolute_axis(&self, axis: Axis);

    fn set_input_pressed(&self, name: &str);
    fn set_input_released(&self, name: &str);

    fn reset(&self);
}

/// A [`VirtualController`] backed by a [`ControllerStateTracker`].
pub struct TrackedController {
    tracker: Arc<ControllerStateTracker>,
}

impl TrackedController {
    pub fn new(port: u32) -> Self {
        Self {
            tracker: Arc::new(ControllerStateTracker::new(port)),
        }
    }

    pub fn tracker(&self) -> &Arc<ControllerStateTracker> {
        &self.tracker
    }

    pub fn input_state(&self, name: &str) -> InputState {
        self.tracker.get_input_state(name)
    }
}

impl VirtualController for TrackedController {
    fn port(&self) -> u32 {
        self.tracker.port()
    }

    fn press_button(&self, id: u32) {
        self.tracker.press_button(id);
    }

    fn release_button(&self, id: u32) {
        self.tracker.release_button(id);
    }

    fn press_axis(&self, axis: Axis, min: bool, percent: f64) {
        let value = if min { -percent } else { percent };
        self.tracker.press_axis(axis.id(), value);
    }

    fn release_axis(&self, axis: Axis) {
        self.tracker.release_axis(axis.id());
    }

    fn press_absolute_axis(&self, axis: Axis, percent: f64) {
        self.tracker.press_axis(axis.id(), percent);
    }

    fn release_absolute_axis(&self, axis: Axis) {
        self.tracker.release_axis(axis.id());
    }

    fn set_input_pressed(&self, name: &str) {
        self.tracker.press_input(name);
    }

    fn set_input_released(&self, name: &str) {
        self.tracker.release_input(name);
    }

    fn reset(&self) {
        self.tracker.reset();
    }
}

/// One controller per port, `0..=max_port`.
pub struct ControllerPool {
    controllers: Vec<Arc<TrackedController>>,
}

impl ControllerPool {
    pub fn new(max_port: u32) -> Self {
        let controllers: Vec<_> = (0..=max_port)
            .map(|port| Arc::new(TrackedController::new(port)))
            .collect();
        info!("Created controller pool with {} ports", controllers.len());

        Self { controllers }
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn get(&self, port: u32) -> Result<&Arc<TrackedController>, ControllerError> {
        usize::try_from(port)
            .ok()
            .and_then(|index| self.controllers.get(index))
            .ok_or(ControllerError::UnknownPort {
                port,
                count: self.controllers.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TrackedController>> {
        self.controllers.iter()
    }

    pub fn reset_all(&self) {
        for controller in &self.controllers {
            controller.reset();
        }
        debug!("Reset all {} controllers", self.controllers.len());
    }
}
