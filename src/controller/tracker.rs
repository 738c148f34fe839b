//! Controller State Tracker
//!
//! Two generations of controller state:
//!
//! ```text
//! timers ──press/release──► pending (scc maps, lock-free per key)
//!                                │
//!                          commit() (one caller at a time)
//!                                │
//!                                ▼
//! device tick ◄──borrow── committed (Arc<ControllerSnapshot> in a watch channel)
//! ```
//!
//! Producers only touch the pending maps and never wait on the consumer.
//! `commit()` builds a fresh snapshot and replaces the committed one in a
//! single send, so readers never see a half-applied tick.

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputState {
    #[default]
    Released,
    Pressed,
}

impl Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputState::Released => write!(f, "released"),
            InputState::Pressed => write!(f, "pressed"),
        }
    }
}

/// One committed generation of a controller.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub generation: u64,
    pub inputs: BTreeMap<String, InputState>,
    pub buttons: BTreeMap<u32, InputState>,
    /// Percent per axis id, negative for the min direction.
    pub axes: BTreeMap<u32, f64>,
    pub committed_at: DateTime<Local>,
}

impl ControllerSnapshot {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            inputs: BTreeMap::new(),
            buttons: BTreeMap::new(),
            axes: BTreeMap::new(),
            committed_at: Local::now(),
        }
    }

    pub fn input_state(&self, name: &str) -> InputState {
        self.inputs.get(name).copied().unwrap_or_default()
    }

    pub fn button_state(&self, id: u32) -> InputState {
        self.buttons.get(&id).copied().unwrap_or_default()
    }

    pub fn axis_state(&self, id: u32) -> f64 {
        self.axes.get(&id).copied().unwrap_or(0.0)
    }

    pub fn pressed_inputs(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|(_, state)| **state == InputState::Pressed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn pressed_buttons(&self) -> Vec<u32> {
        self.buttons
            .iter()
            .filter(|(_, state)| **state == InputState::Pressed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Same controller state, ignoring generation and timestamp.
    pub fn same_state_as(&self, other: &ControllerSnapshot) -> bool {
        self.inputs == other.inputs && self.buttons == other.buttons && self.axes == other.axes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTransition {
    pub name: String,
    pub state: InputState,
}

/// Notified from `commit()` with the named inputs that changed state.
///
/// Observers run after the tracker's locks are released, so they may call
/// back into the tracker, `commit()` and `add_observer()` included.
pub trait InputObserver: Send + Sync {
    fn on_transition(&self, port: u32, transition: &InputTransition);
}

pub struct ControllerStateTracker {
    port: u32,
    inputs: scc::HashMap<String, InputState>,
    buttons: scc::HashMap<u32, InputState>,
    axes: scc::HashMap<u32, f64>,
    committed: watch::Sender<Arc<ControllerSnapshot>>,
    commit_lock: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn InputObserver>>>,
}

impl ControllerStateTracker {
    pub fn new(port: u32) -> Self {
        let (committed, _) = watch::channel(Arc::new(ControllerSnapshot::empty(0)));
        debug!("Created controller state tracker for port {}", port);

        Self {
            port,
            inputs: scc::HashMap::new(),
            buttons: scc::HashMap::new(),
            axes: scc::HashMap::new(),
            committed,
            commit_lock: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn add_observer(&self, observer: Arc<dyn InputObserver>) {
        self.observers.write().push(observer);
    }

    pub fn press_input(&self, name: &str) {
        let _ = self.inputs.upsert_sync(name.to_string(), InputState::Pressed);
    }

    /// Releasing an input that is not pending is a no-op.
    pub fn release_input(&self, name: &str) {
        self.inputs.remove_sync(name);
    }

    pub fn press_button(&self, id: u32) {
        let _ = self.buttons.upsert_sync(id, InputState::Pressed);
    }

    pub fn release_button(&self, id: u32) {
        self.buttons.remove_sync(&id);
    }

    pub fn press_axis(&self, id: u32, percent: f64) {
        let _ = self.axes.upsert_sync(id, percent);
    }

    pub fn release_axis(&self, id: u32) {
        self.axes.remove_sync(&id);
    }

    /// Clears both generations.
    pub fn reset(&self) {
        let _guard = self.commit_lock.lock();
        self.inputs.clear_sync();
        self.buttons.clear_sync();
        self.axes.clear_sync();

        let generation = self.committed.borrow().generation + 1;
        self.committed
            .send_replace(Arc::new(ControllerSnapshot::empty(generation)));
        info!("Reset controller on port {}", self.port);
    }

    /// Publishes the pending generation and returns it.
    pub fn commit(&self) -> Arc<ControllerSnapshot> {
        let (previous, snapshot) = self.publish_pending();
        self.notify(&previous, &snapshot);
        snapshot
    }

    /// Copies the pending maps into a new committed generation.
    fn publish_pending(&self) -> (Arc<ControllerSnapshot>, Arc<ControllerSnapshot>) {
        let _guard = self.commit_lock.lock();
        let previous = self.committed.borrow().clone();

        // Copy the pending maps into the next generation
        let mut snapshot = ControllerSnapshot::empty(previous.generation + 1);
        self.inputs.iter_sync(|name, state| {
            snapshot.inputs.insert(name.clone(), *state);
            true
        });
        self.buttons.iter_sync(|id, state| {
            snapshot.buttons.insert(*id, *state);
            true
        });
        self.axes.iter_sync(|id, percent| {
            snapshot.axes.insert(*id, *percent);
            true
        });

        let snapshot = Arc::new(snapshot);
        self.committed.send_replace(snapshot.clone());
        debug!(
            "Committed generation {} on port {}: {} inputs, {} buttons, {} axes",
            snapshot.generation,
            self.port,
            snapshot.inputs.len(),
            snapshot.buttons.len(),
            snapshot.axes.len()
        );

        (previous, snapshot)
    }

    fn notify(&self, previous: &ControllerSnapshot, current: &ControllerSnapshot) {
        // Snapshot the list so the read lock is not held across callbacks
        let observers: Vec<Arc<dyn InputObserver>> = self.observers.read().clone();
        if observers.is_empty() {
            return;
        }

        let mut transitions = Vec::new();
        for (name, state) in &current.inputs {
            if previous.input_state(name) != *state {
                transitions.push(InputTransition {
                    name: name.clone(),
                    state: *state,
                });
            }
        }
        // Released entries are gone from the new generation
        for name in previous.pressed_inputs() {
            if !current.inputs.contains_key(&name) {
                transitions.push(InputTransition {
                    name,
                    state: InputState::Released,
                });
            }
        }

        for transition in &transitions {
            for observer in observers.iter() {
                observer.on_transition(self.port, transition);
            }
        }
    }

    /// The committed generation.
    pub fn snapshot(&self) -> Arc<ControllerSnapshot> {
        self.committed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ControllerSnapshot>> {
        self.committed.subscribe()
    }

    pub fn get_input_state(&self, name: &str) -> InputState {
        self.committed.borrow().input_state(name)
    }

    pub fn get_button_state(&self, id: u32) -> InputState {
        self.committed.borrow().button_state(id)
    }

    pub fn get_axis_state(&self, id: u32) -> f64 {
        self.committed.borrow().axis_state(id)
    }

    pub fn get_pressed_inputs(&self) -> Vec<String> {
        self.committed.borrow().pressed_inputs()
    }

    /// Inputs pressed in the pending generation.
    pub fn pending_pressed_inputs(&self) -> Vec<String> {
        let mut pressed = Vec::new();
        self.inputs.iter_sync(|name, state| {
            if *state == InputState::Pressed {
                pressed.push(name.clone());
            }
            true
        });
        pressed.sort();
        pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u32, InputTransition)>>,
    }

    impl InputObserver for Recorder {
        fn on_transition(&self, port: u32, transition: &InputTransition) {
            self.seen.lock().push((port, transition.clone()));
        }
    }

    /// Commits again and registers `recorder` from inside the callback.
    struct Reentrant {
        tracker: Arc<ControllerStateTracker>,
        recorder: Arc<Recorder>,
    }

    impl InputObserver for Reentrant {
        fn on_transition(&self, _port: u32, _transition: &InputTransition) {
            self.tracker.commit();
            self.tracker.add_observer(self.recorder.clone());
        }
    }

    #[test]
    fn observers_may_call_back_into_the_tracker() {
        let tracker = Arc::new(ControllerStateTracker::new(0));
        let recorder = Arc::new(Recorder::default());
        tracker.add_observer(Arc::new(Reentrant {
            tracker: tracker.clone(),
            recorder: recorder.clone(),
        }));

        tracker.press_input("a");
        tracker.commit();
        assert!(recorder.seen.lock().is_empty());

        tracker.press_input("b");
        let snapshot = tracker.commit();
        assert_eq!(snapshot.input_state("b"), InputState::Pressed);
        assert_eq!(
            *recorder.seen.lock(),
            vec![(
                0,
                InputTransition {
                    name: "b".to_string(),
                    state: InputState::Pressed,
                }
            )]
        );
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let tracker = ControllerStateTracker::new(0);

        tracker.press_input("a");
        tracker.press_button(4);
        tracker.press_axis(1, -50.0);
        assert_eq!(tracker.get_input_state("a"), InputState::Released);
        assert_eq!(tracker.pending_pressed_inputs(), vec!["a".to_string()]);

        tracker.commit();
        assert_eq!(tracker.get_input_state("a"), InputState::Pressed);
        assert_eq!(tracker.get_button_state(4), InputState::Pressed);
        assert_eq!(tracker.get_axis_state(1), -50.0);
        assert_eq!(tracker.get_pressed_inputs(), vec!["a".to_string()]);

        tracker.release_input("a");
        tracker.release_button(4);
        tracker.release_axis(1);
        assert_eq!(tracker.get_input_state("a"), InputState::Pressed);

        tracker.commit();
        assert_eq!(tracker.get_input_state("a"), InputState::Released);
        assert_eq!(tracker.get_button_state(4), InputState::Released);
        assert_eq!(tracker.get_axis_state(1), 0.0);
    }

    #[test]
    fn releasing_unknown_inputs_is_a_no_op() {
        let tracker = ControllerStateTracker::new(0);

        tracker.release_input("b");
        tracker.release_button(9);
        tracker.release_axis(3);
        let snapshot = tracker.commit();

        assert!(snapshot.inputs.is_empty());
        assert!(snapshot.buttons.is_empty());
        assert!(snapshot.axes.is_empty());
    }

    #[test]
    fn commit_replaces_the_whole_generation() {
        let tracker = ControllerStateTracker::new(0);
        tracker.press_input("a");
        let first = tracker.commit();

        tracker.press_input("b");
        let second = tracker.commit();

        assert_eq!(first.generation + 1, second.generation);
        assert_eq!(first.pressed_inputs(), vec!["a".to_string()]);
        assert_eq!(second.pressed_inputs(), vec!["a".to_string(), "b".to_string()]);
        assert!(Arc::ptr_eq(&second, &tracker.snapshot()));
    }

    #[test]
    fn reset_twice_equals_reset_once() {
        let tracker = ControllerStateTracker::new(0);
        tracker.press_input("a");
        tracker.press_axis(0, 100.0);
        tracker.commit();

        tracker.reset();
        let once = tracker.snapshot();
        tracker.reset();
        let twice = tracker.snapshot();

        assert!(once.same_state_as(&twice));
        assert!(twice.inputs.is_empty());
        assert!(tracker.pending_pressed_inputs().is_empty());
        assert_eq!(tracker.get_axis_state(0), 0.0);
    }

    #[test]
    fn observers_see_transitions_at_commit() {
        let tracker = ControllerStateTracker::new(2);
        let recorder = Arc::new(Recorder::default());
        tracker.add_observer(recorder.clone());

        tracker.press_input("a");
        tracker.commit();
        tracker.commit();
        tracker.release_input("a");
        tracker.commit();

        let seen = recorder.seen.lock();
        assert_eq!(
            *seen,
            vec![
                (
                    2,
                    InputTransition {
                        name: "a".to_string(),
                        state: InputState::Pressed
                    }
                ),
                (
                    2,
                    InputTransition {
                        name: "a".to_string(),
                        state: InputState::Released
                    }
                ),
            ]
        );
    }

    #[test]
    fn concurrent_writers_do_not_lose_presses() {
        let tracker = Arc::new(ControllerStateTracker::new(0));
        let handles: Vec<_> = (0..8u32)
            .map(|id| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    tracker.press_button(id);
                    tracker.press_input(&format!("in{id}"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        let snapshot = tracker.commit();
        assert_eq!(snapshot.pressed_buttons(), (0..8).collect::<Vec<_>>());
        assert_eq!(snapshot.pressed_inputs().len(), 8);
    }
}
