//! NES button table.

use super::{with_buttons, ConsoleCapability, ConsoleKind};

pub fn capability() -> ConsoleCapability {
    let mut console = with_buttons!(ConsoleCapability::new(ConsoleKind::Nes), {
        "left" => 0,
        "right" => 1,
        "up" => 2,
        "down" => 3,
        "a" => 8,
        "b" => 9,
        "select" => 12,
        "start" => 13,
    });

    for slot in 1..=6u32 {
        console = console
            .with_button(&format!("ss{slot}"), 19 + slot)
            .with_button(&format!("ls{slot}"), 25 + slot);
    }
    console
}
