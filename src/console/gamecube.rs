//! GameCube inputs.
//!
//! The main stick and c-stick directions are axes, with left/up pushing
//! toward the minimum. `l` and `r` are triggers: a full press clicks the
//! digital button, a partial press moves the analog trigger axis.

use super::{with_buttons, Axis, ConsoleCapability, ConsoleKind};

pub fn capability() -> ConsoleCapability {
    let console = with_buttons!(ConsoleCapability::new(ConsoleKind::GameCube), {
        "left" => 0,
        "right" => 1,
        "up" => 2,
        "down" => 3,
        "a" => 4,
        "b" => 5,
        "z" => 8,
        "start" => 9,
        "cleft" => 10,
        "cright" => 11,
        "cup" => 12,
        "cdown" => 13,
        "dleft" => 14,
        "dright" => 15,
        "dup" => 16,
        "ddown" => 17,
        "x" => 30,
        "y" => 31,
    });

    let mut console = console
        .with_axis("left", Axis::X, true)
        .with_axis("right", Axis::X, false)
        .with_axis("up", Axis::Y, true)
        .with_axis("down", Axis::Y, false)
        .with_axis("cleft", Axis::RX, true)
        .with_axis("cright", Axis::RX, false)
        .with_axis("cup", Axis::RY, true)
        .with_axis("cdown", Axis::RY, false)
        .with_trigger("l", 6, Axis::RZ)
        .with_trigger("r", 7, Axis::Z);

    for slot in 1..=6u32 {
        console = console
            .with_button(&format!("ss{slot}"), 17 + slot)
            .with_button(&format!("ls{slot}"), 23 + slot);
    }
    console
}
