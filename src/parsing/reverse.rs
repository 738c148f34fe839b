//! Renders parsed sequences back into text, either as command syntax that
//! parses to the same sequence or as plain English for chat replies.

use super::parser::ParserSettings;
use super::sequence::{DurationType, ParsedInput, ParsedInputSequence};
use crate::console::ConsoleCapability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowPorts {
    None,
    All,
    #[default]
    NonDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowDurations {
    All,
    #[default]
    NonDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReverseOptions {
    pub ports: ShowPorts,
    pub durations: ShowDurations,
}

fn duration_token(input: &ParsedInput) -> String {
    match input.duration_type {
        DurationType::Seconds => format!("{}s", input.duration_ms / 1000),
        DurationType::Milliseconds => format!("{}ms", input.duration_ms),
    }
}

fn reverse_input(
    input: &ParsedInput,
    console: &ConsoleCapability,
    settings: &ParserSettings,
    options: ReverseOptions,
) -> String {
    let mut out = String::new();

    let show_port = match options.ports {
        ShowPorts::None => false,
        ShowPorts::All => true,
        ShowPorts::NonDefault => input.controller_port != settings.default_port,
    };
    if show_port {
        out.push_str(&format!("&{}", u64::from(input.controller_port) + 1));
    }

    // Modifier, name, then percent and duration
    if input.hold {
        out.push('_');
    } else if input.release {
        out.push('-');
    }
    out.push_str(&input.name);

    // Axes always show a percent so they don't read back as buttons
    if input.percent != 100.0 || console.is_axis(&input.name, input.percent) {
        out.push_str(&format!("{}%", input.percent));
    }

    // Waits have no meaning without a duration
    let show_duration = options.durations == ShowDurations::All
        || input.duration_ms != settings.default_duration_ms
        || console.is_wait(&input.name);
    if show_duration {
        out.push_str(&duration_token(input));
    }

    out
}

/// Command text for a `Valid` sequence, the empty string otherwise.
pub fn reverse_parse(
    sequence: &ParsedInputSequence,
    console: &ConsoleCapability,
    settings: &ParserSettings,
    options: ReverseOptions,
) -> String {
    if !sequence.is_valid() {
        return String::new();
    }

    sequence
        .groups()
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|input| reverse_input(input, console, settings, options))
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn natural_duration(input: &ParsedInput) -> String {
    let (value, unit) = match input.duration_type {
        DurationType::Seconds => (input.duration_ms / 1000, "sec"),
        DurationType::Milliseconds => (input.duration_ms, "msec"),
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural}")
}

fn natural_input(input: &ParsedInput, console: &ConsoleCapability, first: bool) -> String {
    let wait = console.is_wait(&input.name);
    let verb = if wait {
        "wait"
    } else if input.hold {
        "hold"
    } else if input.release {
        "release"
    } else {
        "press"
    };

    let mut words = vec![if first {
        capitalize(verb)
    } else {
        verb.to_string()
    }];

    if !wait {
        words.push(format!("\"{}\"", input.name));
        if !input.release
            && (input.percent != 100.0 || console.is_axis(&input.name, input.percent))
        {
            words.push(format!("{}%", input.percent));
        }
    }
    // Releases are instant
    if !input.release {
        words.push(natural_duration(input));
    }

    words.join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// English description of a `Valid` sequence, e.g.
/// `Press "a" 200 msecs AND press "b" 200 msecs, THEN wait 1 sec.`
pub fn reverse_parse_natural(sequence: &ParsedInputSequence, console: &ConsoleCapability) -> String {
    if !sequence.is_valid() {
        return "Invalid input!".to_string();
    }

    let mut first = true;
    let groups: Vec<String> = sequence
        .groups()
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|input| {
                    let phrase = natural_input(input, console, first);
                    first = false;
                    phrase
                })
                .collect::<Vec<_>>()
                .join(" AND ")
        })
        .collect();

    format!("{}.", groups.join(", THEN "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{gamecube, snes};
    use crate::parsing::parser::InputParser;
    use crate::parsing::tables::{MacroTable, SynonymTable};
    use std::sync::Arc;

    fn parser(console: ConsoleCapability) -> InputParser {
        InputParser::new(
            Arc::new(MacroTable::default()),
            &SynonymTable::default(),
            Arc::new(console),
            ParserSettings::default(),
        )
    }

    fn reverse(parser: &InputParser, text: &str, options: ReverseOptions) -> String {
        reverse_parse(
            &parser.parse(text),
            parser.console(),
            parser.settings(),
            options,
        )
    }

    #[test]
    fn default_options_hide_default_values() {
        let snes = parser(snes::capability());
        let text = reverse(&snes, "_a500ms b200ms #1s -a1300ms", ReverseOptions::default());

        assert_eq!(text, "_a500ms b #1s -a1300ms");
        assert_eq!(snes.parse(&text), snes.parse("_a500ms b200ms #1s -a1300ms"));
    }

    #[test]
    fn all_ports_and_durations() {
        let snes = parser(snes::capability());
        let options = ReverseOptions {
            ports: ShowPorts::All,
            durations: ShowDurations::All,
        };

        assert_eq!(reverse(&snes, "a+&2b50% .", options), "&1a200ms+&2b50%200ms &1.200ms");
    }

    #[test]
    fn axes_always_show_percent() {
        let gc = parser(gamecube::capability());

        assert_eq!(reverse(&gc, "left", ReverseOptions::default()), "left100%");
        assert_eq!(reverse(&gc, "l30% r", ReverseOptions::default()), "l30% r");
    }

    #[test]
    fn non_valid_sequences_render_nothing() {
        let snes = parser(snes::capability());

        assert_eq!(reverse(&snes, "a101%", ReverseOptions::default()), "");
        assert_eq!(
            reverse_parse_natural(&snes.parse("hello"), snes.console()),
            "Invalid input!"
        );
    }

    #[test]
    fn natural_language() {
        let snes = parser(snes::capability());
        let seq = snes.parse("a+_b500ms #1s -x");

        assert_eq!(
            reverse_parse_natural(&seq, snes.console()),
            "Press \"a\" 200 msecs AND hold \"b\" 500 msecs, THEN wait 1 sec, THEN release \"x\"."
        );
    }
}
