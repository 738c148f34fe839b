//! Turns a parsed input into calls on a [`VirtualController`].

use super::virtual_controller::VirtualController;
use crate::console::ConsoleCapability;
use crate::parsing::ParsedInput;
use tracing::error;

pub fn press_input<C>(controller: &C, console: &ConsoleCapability, input: &ParsedInput)
where
    C: VirtualController + ?Sized,
{
    let name = input.name.as_str();
    if console.is_wait(name) {
        return;
    }

    // Partial trigger press
    if console.is_absolute_axis(name, input.percent) {
        if let Some(axis) = console.get_axis(name, input.percent) {
            controller.press_absolute_axis(axis, input.percent);
        }
        // The trigger's digital click must not stay down under a partial press.
        if let Some(button) = console.button_id(name) {
            controller.release_button(button);
        }
    } else if let Some(axis) = console.get_axis(name, input.percent) {
        // Stick direction
        controller.press_axis(axis, console.is_min_axis(name), input.percent);
    } else if console.is_button(name, input.percent) {
        let Some(button) = console.button_id(name) else {
            error!("Input \"{}\" on {} has no button id", name, console.kind());
            return;
        };
        controller.press_button(button);
        // A full trigger press clears any partial one
        if let Some(axis) = console.axis_binding(name) {
            controller.release_absolute_axis(axis);
        }
    } else {
        error!("Input \"{}\" is not bound on {}", name, console.kind());
        return;
    }

    controller.set_input_pressed(name);
}

pub fn release_input<C>(controller: &C, console: &ConsoleCapability, input: &ParsedInput)
where
    C: VirtualController + ?Sized,
{
    let name = input.name.as_str();
    if console.is_wait(name) {
        return;
    }

    if console.is_absolute_axis(name, input.percent) {
        if let Some(axis) = console.get_axis(name, input.percent) {
            controller.release_absolute_axis(axis);
        }
        if let Some(button) = console.button_id(name) {
            controller.release_button(button);
        }
    } else if let Some(axis) = console.get_axis(name, input.percent) {
        controller.release_axis(axis);
    } else if console.is_button(name, input.percent) {
        let Some(button) = console.button_id(name) else {
            error!("Input \"{}\" on {} has no button id", name, console.kind());
            return;
        };
        controller.release_button(button);
        if let Some(axis) = console.axis_binding(name) {
            controller.release_absolute_axis(axis);
        }
    } else {
        error!("Input \"{}\" is not bound on {}", name, console.kind());
        return;
    }

    controller.set_input_released(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{gamecube, snes, Axis, ConsoleKind, CustomConsoleConfig};
    use crate::parsing::{InputParser, MacroTable, ParserSettings, SynonymTable};
    use std::sync::Arc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn log(&self, call: String) {
            self.calls.lock().push(call);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl VirtualController for Recording {
        fn port(&self) -> u32 {
            0
        }
        fn press_button(&self, id: u32) {
            self.log(format!("press button {id}"));
        }
        fn release_button(&self, id: u32) {
            self.log(format!("release button {id}"));
        }
        fn press_axis(&self, axis: Axis, min: bool, percent: f64) {
            self.log(format!("press axis {axis} min={min} {percent}"));
        }
        fn release_axis(&self, axis: Axis) {
            self.log(format!("release axis {axis}"));
        }
        fn press_absolute_axis(&self, axis: Axis, percent: f64) {
            self.log(format!("press absolute {axis} {percent}"));
        }
        fn release_absolute_axis(&self, axis: Axis) {
            self.log(format!("release absolute {axis}"));
        }
        fn set_input_pressed(&self, name: &str) {
            self.log(format!("input {name} pressed"));
        }
        fn set_input_released(&self, name: &str) {
            self.log(format!("input {name} released"));
        }
        fn reset(&self) {
            self.log("reset".to_string());
        }
    }

    fn input(name: &str, percent: f64) -> ParsedInput {
        ParsedInput {
            percent,
            ..ParsedInput::new(name, 0, 200)
        }
    }

    #[test]
    fn partial_trigger_drives_the_axis() {
        let gc = gamecube::capability();
        let pad = Recording::default();

        press_input(&pad, &gc, &input("l", 50.0));
        assert_eq!(
            pad.take(),
            vec!["press absolute RZ 50", "release button 6", "input l pressed"]
        );

        release_input(&pad, &gc, &input("l", 50.0));
        assert_eq!(
            pad.take(),
            vec!["release absolute RZ", "release button 6", "input l released"]
        );
    }

    #[test]
    fn full_trigger_is_a_button() {
        let gc = gamecube::capability();
        let pad = Recording::default();

        press_input(&pad, &gc, &input("r", 100.0));
        assert_eq!(
            pad.take(),
            vec!["press button 7", "release absolute Z", "input r pressed"]
        );
    }

    #[test]
    fn stick_directions_carry_the_min_flag() {
        let gc = gamecube::capability();
        let pad = Recording::default();

        press_input(&pad, &gc, &input("left", 100.0));
        press_input(&pad, &gc, &input("cright", 25.0));
        assert_eq!(
            pad.take(),
            vec![
                "press axis X min=true 100",
                "input left pressed",
                "press axis RX min=false 25",
                "input cright pressed",
            ]
        );
    }

    #[test]
    fn waits_and_unknown_inputs_touch_nothing() {
        let snes = snes::capability();
        let pad = Recording::default();

        press_input(&pad, &snes, &input("#", 100.0));
        release_input(&pad, &snes, &input(".", 100.0));
        press_input(&pad, &snes, &input("cleft", 100.0));
        assert!(pad.take().is_empty());

        press_input(&pad, &snes, &input("a", 100.0));
        assert_eq!(pad.take(), vec!["press button 4", "input a pressed"]);
    }

    #[test]
    fn custom_inputs_parse_and_render_in_any_case() {
        let mut custom = CustomConsoleConfig::default();
        custom.buttons.insert("Jump".to_string(), 4);
        let console = Arc::new(ConsoleKind::Generic.capability(&custom));
        let parser = InputParser::new(
            Arc::new(MacroTable::default()),
            &SynonymTable::default(),
            console.clone(),
            ParserSettings::default(),
        );
        let pad = Recording::default();

        let sequence = parser.parse("JUMP");
        assert!(sequence.is_valid(), "{}", sequence.error);
        press_input(&pad, &console, &sequence.groups()[0][0]);
        assert_eq!(pad.take(), vec!["press button 4", "input jump pressed"]);
    }
}
