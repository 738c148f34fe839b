//! Super Nintendo button table.

use super::{with_buttons, ConsoleCapability, ConsoleKind};

pub fn capability() -> ConsoleCapability {
    let console = with_buttons!(ConsoleCapability::new(ConsoleKind::Snes), {
        "left" => 0,
        "right" => 1,
        "up" => 2,
        "down" => 3,
        "a" => 4,
        "b" => 5,
        "l" => 6,
        "r" => 7,
        "select" => 8,
        "start" => 9,
        "x" => 30,
        "y" => 31,
    });

    with_savestates(console)
}

/// Save and load slots, spelled out and abbreviated (`savestate1` / `ss1`).
fn with_savestates(mut console: ConsoleCapability) -> ConsoleCapability {
    for slot in 1..=6u32 {
        let save = 17 + slot;
        let load = 23 + slot;
        console = console
            .with_button(&format!("savestate{slot}"), save)
            .with_button(&format!("ss{slot}"), save)
            .with_button(&format!("loadstate{slot}"), load)
            .with_button(&format!("ls{slot}"), load);
    }
    console
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savestate_slots() {
        let snes = capability();

        assert_eq!(snes.button_id("ss1"), Some(18));
        assert_eq!(snes.button_id("ss6"), Some(23));
        assert_eq!(snes.button_id("loadstate1"), Some(24));
        assert_eq!(snes.button_id("ls6"), Some(29));
    }
}
