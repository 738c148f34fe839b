//! Console capability model
//!
//! Each supported console is described by one [`ConsoleCapability`] value
//! built from its table module:
//!
//! 1. [`nes`] - buttons only
//! 2. [`snes`] - buttons only
//! 3. [`gamecube`] - sticks, c-stick and analog triggers
//!
//! A `Generic` console starts with nothing but the wait tokens and is filled
//! from configuration.
//!
//! # Classification
//!
//! ```text
//!                ┌─ wait?          "#" / "."         → no-op
//! input name ────┼─ absolute axis? "l" / "r" < 100%  → trigger axis
//!  + percent     ├─ axis?          stick directions  → axis (min flag)
//!                └─ button?        everything else   → button id
//! ```
//!
//! Dual inputs (the GameCube triggers) are the only names whose class depends
//! on the percent: a full press is the digital button, anything lower drives
//! the analog axis.

pub mod gamecube;
pub mod nes;
pub mod snes;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Display};

/// The wait token every console understands.
pub const WAIT_INPUT: &str = "#";
/// Alternative spelling of [`WAIT_INPUT`].
pub const WAIT_INPUT_ALT: &str = ".";

macro_rules! with_buttons {
    ($console:expr, { $($name:literal => $id:expr),* $(,)? }) => {
        $console$(.with_button($name, $id))*
    };
}
pub(crate) use with_buttons;

/// Axis identifiers shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
    RX,
    RY,
    RZ,
    M1,
    M2,
}

impl Axis {
    pub const fn id(self) -> u32 {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::RX => 3,
            Axis::RY => 4,
            Axis::RZ => 5,
            Axis::M1 => 6,
            Axis::M2 => 7,
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
            Axis::RX => write!(f, "RX"),
            Axis::RY => write!(f, "RY"),
            Axis::RZ => write!(f, "RZ"),
            Axis::M1 => write!(f, "M1"),
            Axis::M2 => write!(f, "M2"),
        }
    }
}

/// The consoles the parser can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleKind {
    Nes,
    #[default]
    Snes,
    GameCube,
    Generic,
}

impl Display for ConsoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleKind::Nes => write!(f, "NES"),
            ConsoleKind::Snes => write!(f, "SNES"),
            ConsoleKind::GameCube => write!(f, "GameCube"),
            ConsoleKind::Generic => write!(f, "Generic"),
        }
    }
}

impl ConsoleKind {
    /// Builds the capability table for this console.
    ///
    /// `Generic` consoles take their inputs from `custom`; the other kinds
    /// ignore it.
    pub fn capability(self, custom: &CustomConsoleConfig) -> ConsoleCapability {
        match self {
            ConsoleKind::Nes => nes::capability(),
            ConsoleKind::Snes => snes::capability(),
            ConsoleKind::GameCube => gamecube::capability(),
            ConsoleKind::Generic => custom.build(),
        }
    }
}

/// Axis binding for a custom console input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBinding {
    pub axis: Axis,
    #[serde(default)]
    pub min: bool,
}

/// Inputs of a `Generic` console, as loaded from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomConsoleConfig {
    pub buttons: BTreeMap<String, u32>,
    pub axes: BTreeMap<String, AxisBinding>,
}

impl CustomConsoleConfig {
    pub fn build(&self) -> ConsoleCapability {
        let mut console = ConsoleCapability::new(ConsoleKind::Generic);
        for (name, id) in &self.buttons {
            console = console.with_button(name, *id);
        }
        for (name, binding) in &self.axes {
            console = console.with_axis(name, binding.axis, binding.min);
        }
        console
    }
}

fn input_key(name: &str) -> String {
    name.to_lowercase()
}

/// What a console can do with each of its input names.
#[derive(Debug, Clone)]
pub struct ConsoleCapability {
    kind: ConsoleKind,
    valid_inputs: Vec<String>,
    buttons: HashMap<String, u32>,
    axes: HashMap<String, Axis>,
    min_axes: HashSet<String>,
    // Button at a full press, absolute axis below it.
    dual_inputs: HashSet<String>,
}

impl ConsoleCapability {
    /// An empty console that only knows the wait tokens.
    pub fn new(kind: ConsoleKind) -> Self {
        Self {
            kind,
            valid_inputs: vec![WAIT_INPUT.to_string(), WAIT_INPUT_ALT.to_string()],
            buttons: HashMap::new(),
            axes: HashMap::new(),
            min_axes: HashSet::new(),
            dual_inputs: HashSet::new(),
        }
    }

    /// Input names are stored lowercased, the form messages are matched in.
    pub fn with_button(mut self, name: &str, id: u32) -> Self {
        let name = input_key(name);
        self.add_valid_input(&name);
        self.buttons.insert(name, id);
        self
    }

    pub fn with_axis(mut self, name: &str, axis: Axis, min: bool) -> Self {
        let name = input_key(name);
        self.add_valid_input(&name);
        self.axes.insert(name.clone(), axis);
        if min {
            self.min_axes.insert(name);
        } else {
            self.min_axes.remove(&name);
        }
        self
    }

    /// Marks an input that has both a button and an axis binding as a trigger.
    pub fn with_trigger(mut self, name: &str, button: u32, axis: Axis) -> Self {
        self = self.with_button(name, button);
        self = self.with_axis(name, axis, false);
        self.dual_inputs.insert(input_key(name));
        self
    }

    fn add_valid_input(&mut self, name: &str) {
        if !self.valid_inputs.iter().any(|existing| existing == name) {
            self.valid_inputs.push(name.to_string());
        }
    }

    pub fn kind(&self) -> ConsoleKind {
        self.kind
    }

    /// Every input name the grammar should recognize, wait tokens included.
    pub fn valid_inputs(&self) -> &[String] {
        &self.valid_inputs
    }

    pub fn is_valid_input(&self, name: &str) -> bool {
        self.valid_inputs.iter().any(|input| input == name)
    }

    pub fn is_wait(&self, name: &str) -> bool {
        name == WAIT_INPUT || name == WAIT_INPUT_ALT
    }

    pub fn is_axis(&self, name: &str, percent: f64) -> bool {
        if self.is_wait(name) {
            return false;
        }
        if self.dual_inputs.contains(name) {
            return percent < 100.0;
        }
        self.axes.contains_key(name)
    }

    pub fn is_absolute_axis(&self, name: &str, percent: f64) -> bool {
        !self.is_wait(name) && self.dual_inputs.contains(name) && percent < 100.0
    }

    pub fn is_min_axis(&self, name: &str) -> bool {
        self.min_axes.contains(name)
    }

    pub fn is_button(&self, name: &str, percent: f64) -> bool {
        if self.is_wait(name) {
            return false;
        }
        if self.dual_inputs.contains(name) {
            return percent >= 100.0;
        }
        self.buttons.contains_key(name) && !self.axes.contains_key(name)
    }

    /// The axis this input drives at the given percent, if it drives one.
    pub fn get_axis(&self, name: &str, percent: f64) -> Option<Axis> {
        if !self.is_axis(name, percent) {
            return None;
        }
        self.axes.get(name).copied()
    }

    /// Raw button binding, regardless of how the input is classified.
    pub fn button_id(&self, name: &str) -> Option<u32> {
        self.buttons.get(name).copied()
    }

    /// Raw axis binding, regardless of how the input is classified.
    pub fn axis_binding(&self, name: &str) -> Option<Axis> {
        self.axes.get(name).copied()
    }
}
