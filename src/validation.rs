//! Checks run on a `Valid` sequence before it is executed.

use crate::controller::ControllerPool;
use crate::controller::InputState;
use crate::parsing::InputGroup;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictionSettings {
    /// Inputs that may never be down together on one port.
    pub invalid_combo: Vec<String>,
    pub pause_input: Option<String>,
    pub max_pause_duration_ms: Option<i64>,
}

/// `false` if running `groups` would press every input of `invalid_combo`
/// at once on some port. Inputs already pressed on the pool count as held.
pub fn validate_button_combos(
    groups: &[InputGroup],
    invalid_combo: &[String],
    pool: &ControllerPool,
) -> bool {
    if invalid_combo.is_empty() {
        return true;
    }
    let combo_len = invalid_combo.len();

    let mut held: HashMap<u32, HashSet<&str>> = HashMap::new();
    for controller in pool.iter() {
        let pressed: HashSet<&str> = invalid_combo
            .iter()
            .map(String::as_str)
            .filter(|name| controller.input_state(name) == InputState::Pressed)
            .collect();
        if !pressed.is_empty() {
            held.insert(controller.tracker().port(), pressed);
        }
    }

    for group in groups {
        let mut pressed: HashMap<u32, HashSet<&str>> = HashMap::new();

        for input in group {
            let name = input.name.as_str();
            if !invalid_combo.iter().any(|combo| combo == name) {
                continue;
            }
            let port = input.controller_port;
            let current = held.entry(port).or_default();
            let sub = pressed.entry(port).or_default();

            if !input.release && !sub.contains(name) && !current.contains(name) {
                sub.insert(name);
                if sub.len() + current.len() == combo_len {
                    debug!("Sequence presses the invalid combo on port {}", port);
                    return false;
                }
            }

            if input.hold {
                if current.insert(name) {
                    sub.remove(name);
                    if sub.len() + current.len() == combo_len {
                        debug!("Sequence holds the invalid combo on port {}", port);
                        return false;
                    }
                }
            } else if input.release {
                current.remove(name);
            }
        }
    }

    true
}

/// `false` if `pause_input` stays down for more than `max_pause_ms` in a row.
///
/// Consecutive groups that press or hold the pause input add up; a group
/// without it resets the count. While held, each group adds its longest
/// member.
pub fn is_valid_pause_duration(groups: &[InputGroup], pause_input: &str, max_pause_ms: i64) -> bool {
    if max_pause_ms < 0 {
        return true;
    }

    let mut pause_duration: i64 = 0;
    let mut held = false;

    for group in groups {
        let mut found = false;
        let mut longest_input: i64 = 0;
        let mut longest_pause: i64 = 0;

        for input in group {
            longest_input = longest_input.max(input.duration_ms);
            if input.name != pause_input {
                continue;
            }

            longest_pause = longest_pause.max(input.duration_ms);
            found = true;
            if input.release {
                held = false;
                found = false;
            } else if input.hold {
                held = true;
            }
        }

        if found || held {
            let added = if held { longest_input } else { longest_pause };
            pause_duration = pause_duration.saturating_add(added);
            if pause_duration > max_pause_ms {
                return false;
            }
        } else {
            pause_duration = 0;
        }
    }

    pause_duration <= max_pause_ms
}
