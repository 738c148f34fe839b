use super::error::{ParseError, ParseFailure};
use super::grammar::{Grammar, InputMatch, Span};
use super::preparser::PreparserChain;
use super::sequence::{DurationType, InputGroup, ParsedInput, ParsedInputSequence};
use super::tables::{MacroTable, SynonymTable};
use crate::console::ConsoleCapability;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Input that may not be held long enough to open console menus.
pub const START_INPUT: &str = "start";
pub const START_DURATION_LIMIT_MS: i64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// 0-based port used when a token names none.
    pub default_port: u32,
    /// Highest 0-based port a token may name.
    pub max_port: u32,
    pub default_duration_ms: i64,
    pub max_duration_ms: i64,
    pub check_max_duration: bool,
    pub max_macro_recursion: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            default_port: 0,
            max_port: 1,
            default_duration_ms: 200,
            max_duration_ms: 60_000,
            check_max_duration: true,
            max_macro_recursion: 10,
        }
    }
}

/// Turns chat text into a timed input sequence for one console.
///
/// The parser is immutable after construction; share it behind an `Arc` and
/// replace it wholesale through [`SharedParser`] when tables change.
pub struct InputParser {
    chain: PreparserChain,
    grammar: Grammar,
    console: Arc<ConsoleCapability>,
    settings: ParserSettings,
}

impl InputParser {
    pub fn new(
        macros: Arc<MacroTable>,
        synonyms: &SynonymTable,
        console: Arc<ConsoleCapability>,
        settings: ParserSettings,
    ) -> Self {
        let chain = PreparserChain::standard(
            macros,
            synonyms.for_console(console.kind()),
            settings.max_macro_recursion,
        );
        let grammar = Grammar::assemble(console.valid_inputs());
        info!(
            "Built input parser for {} with {} inputs",
            console.kind(),
            grammar.input_names().len()
        );

        Self {
            chain,
            grammar,
            console,
            settings,
        }
    }

    pub fn console(&self) -> &Arc<ConsoleCapability> {
        &self.console
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn preparse(&self, message: &str) -> String {
        self.chain.preparse(message)
    }

    pub fn parse(&self, message: &str) -> ParsedInputSequence {
        let text = self.preparse(message);
        self.parse_preparsed(&text)
    }

    /// Parses text that already went through the preparser chain.
    pub fn parse_preparsed(&self, text: &str) -> ParsedInputSequence {
        let sequence = self
            .build_sequence(text)
            .unwrap_or_else(ParsedInputSequence::invalid);

        debug!(
            "Parsed \"{}\" as {} ({}ms) {}",
            text, sequence.result, sequence.total_duration_ms, sequence.error
        );
        sequence
    }

    fn build_sequence(&self, text: &str) -> Result<ParsedInputSequence, ParseFailure> {
        let mut groups: Vec<InputGroup> = Vec::new();
        let mut current: InputGroup = Vec::new();
        let mut group_max: i64 = 0;
        let mut total: i64 = 0;
        let mut prev_end = 0;
        let mut open_marker: Option<Span> = None;
        let mut matched = false;

        for found in self.grammar.matches(text) {
            matched = true;
            // Any gap between tokens makes this ordinary chat
            if found.start != prev_end {
                return Ok(ParsedInputSequence::normal_message());
            }
            prev_end = found.end;

            let input = self.build_input(text, &found)?;
            // A group lasts as long as its longest input
            group_max = group_max.max(input.duration_ms);
            current.push(input);

            // Check the running total with this group included
            let projected = total.checked_add(group_max).ok_or_else(|| {
                ParseFailure::new(
                    ParseError::DurationOverflow("summing the sequence"),
                    text,
                    found.start,
                    found.text,
                )
            })?;
            if self.settings.check_max_duration && projected > self.settings.max_duration_ms {
                return Err(ParseFailure::new(
                    ParseError::MaxDurationExceeded {
                        total_ms: projected,
                        max_ms: self.settings.max_duration_ms,
                    },
                    text,
                    found.start,
                    found.text,
                ));
            }

            // '+' keeps the group open for the next token
            match found.simultaneous {
                Some(marker) => open_marker = Some(marker),
                None => {
                    groups.push(std::mem::take(&mut current));
                    total = projected;
                    group_max = 0;
                    open_marker = None;
                }
            }
        }

        if !matched {
            return Ok(ParsedInputSequence::normal_message());
        }
        if let Some(marker) = open_marker {
            return Err(ParseFailure::new(
                ParseError::TrailingSimultaneous,
                text,
                marker.offset,
                marker.text,
            ));
        }
        // Unmatched trailing text
        if prev_end != text.len() {
            return Ok(ParsedInputSequence::normal_message());
        }

        Ok(ParsedInputSequence::valid(groups, total))
    }

    fn build_input(&self, text: &str, found: &InputMatch) -> Result<ParsedInput, ParseFailure> {
        let fail = |kind: ParseError, span: Span| ParseFailure::new(kind, text, span.offset, span.text);

        let name = found
            .name
            .ok_or_else(|| ParseFailure::new(ParseError::MissingInput, text, found.start, found.text))?;

        let mut input = ParsedInput::new(
            name.text,
            self.settings.default_port,
            self.settings.default_duration_ms,
        );

        // Modifiers
        if let (Some(_), Some(release)) = (found.hold, found.release) {
            return Err(fail(ParseError::HoldAndRelease, release));
        }
        input.hold = found.hold.is_some();
        input.release = found.release.is_some();

        if let Some(span) = found.port {
            input.controller_port = self.port(span.text).map_err(|e| fail(e, span))?;
        }

        if let Some(span) = found.percent {
            input.percent = percent(span.text).map_err(|e| fail(e, span))?;
        }

        // Duration, at most one unit
        match (found.milliseconds, found.seconds) {
            (Some(_), Some(seconds)) => return Err(fail(ParseError::BothDurations, seconds)),
            (Some(span), None) => {
                input.duration_ms = span
                    .text
                    .trim_end_matches("ms")
                    .parse()
                    .map_err(|_| fail(ParseError::DurationOverflow("converting milliseconds"), span))?;
                input.duration_type = DurationType::Milliseconds;
            }
            (None, Some(span)) => {
                let (duration_ms, duration_type) =
                    seconds_to_ms(span.text.trim_end_matches('s')).map_err(|e| fail(e, span))?;
                input.duration_ms = duration_ms;
                input.duration_type = duration_type;
            }
            (None, None) => {}
        }

        if input.name == START_INPUT && input.duration_ms >= START_DURATION_LIMIT_MS {
            let span = found.milliseconds.or(found.seconds).unwrap_or(name);
            return Err(fail(
                ParseError::StartDurationExceeded {
                    duration_ms: input.duration_ms,
                    limit_ms: START_DURATION_LIMIT_MS,
                },
                span,
            ));
        }

        Ok(input)
    }

    /// Converts a 1-based `&N` marker to a 0-based port.
    fn port(&self, marker: &str) -> Result<u32, ParseError> {
        let written: i64 = marker
            .trim_start_matches('&')
            .parse()
            .map_err(|_| ParseError::InvalidPort)?;
        let port = written - 1;

        if port < 0 {
            return Err(ParseError::InvalidPort);
        }
        if port > i64::from(self.settings.max_port) {
            return Err(ParseError::PortAboveMax {
                port: written,
                max: self.settings.max_port.saturating_add(1),
            });
        }
        u32::try_from(port).map_err(|_| ParseError::InvalidPort)
    }
}

fn percent(text: &str) -> Result<f64, ParseError> {
    let value: f64 = text
        .trim_end_matches('%')
        .parse()
        .map_err(|_| ParseError::InvalidPercent)?;

    if !(0.0..=100.0).contains(&value) {
        return Err(ParseError::PercentOutOfRange(value));
    }
    Ok(value)
}

/// `"1.25"` → 1250ms. Digits past the third decimal must be zero.
fn seconds_to_ms(value: &str) -> Result<(i64, DurationType), ParseError> {
    let overflow = ParseError::DurationOverflow("converting seconds");
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

    let whole: i64 = whole.parse().map_err(|_| overflow.clone())?;
    let (millis, rest) = fraction.split_at(fraction.len().min(3));
    if rest.chars().any(|c| c != '0') {
        return Err(ParseError::SubMillisecondDuration);
    }

    let millis: i64 = if millis.is_empty() {
        0
    } else {
        format!("{millis:0<3}").parse().map_err(|_| overflow.clone())?
    };
    let total = whole
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(millis))
        .ok_or(overflow)?;

    let duration_type = if millis == 0 {
        DurationType::Seconds
    } else {
        DurationType::Milliseconds
    };
    Ok((total, duration_type))
}

/// The current parser, replaced as a whole when tables or settings change.
pub struct SharedParser {
    current: RwLock<Arc<InputParser>>,
}

impl SharedParser {
    pub fn new(parser: InputParser) -> Self {
        Self {
            current: RwLock::new(Arc::new(parser)),
        }
    }

    pub fn load(&self) -> Arc<InputParser> {
        self.current.read().clone()
    }

    /// Installs `parser` and hands back the one it replaced.
    pub fn swap(&self, parser: InputParser) -> Arc<InputParser> {
        let old = std::mem::replace(&mut *self.current.write(), Arc::new(parser));
        info!("Swapped input parser for {}", old.console().kind());
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{gamecube, snes};
    use crate::parsing::sequence::SequenceResult;
    use crate::parsing::tables::{Macro, Synonym};
    use crate::console::ConsoleKind;

    fn parser_with(settings: ParserSettings, macros: Vec<Macro>) -> InputParser {
        InputParser::new(
            Arc::new(MacroTable::new(macros)),
            &SynonymTable::default(),
            Arc::new(snes::capability()),
            settings,
        )
    }

    fn parser() -> InputParser {
        parser_with(ParserSettings::default(), Vec::new())
    }

    fn names(sequence: &ParsedInputSequence) -> Vec<Vec<&str>> {
        sequence
            .groups()
            .iter()
            .map(|group| group.iter().map(|input| input.name.as_str()).collect())
            .collect()
    }

    fn failure_kind(sequence: &ParsedInputSequence) -> Option<&ParseError> {
        sequence.failure.as_ref().map(|failure| &failure.kind)
    }

    #[test]
    fn single_input_uses_defaults() {
        let seq = parser().parse("a");

        assert_eq!(seq.result, SequenceResult::Valid);
        assert_eq!(seq.total_duration_ms, 200);
        assert_eq!(seq.groups(), &[vec![ParsedInput::new("a", 0, 200)]]);
        assert!(seq.error.is_empty());
    }

    #[test]
    fn simultaneous_inputs_share_a_group() {
        let seq = parser().parse("a+b");

        assert!(seq.is_valid());
        assert_eq!(names(&seq), vec![vec!["a", "b"]]);
        assert_eq!(seq.total_duration_ms, 200);
    }

    #[test]
    fn sequential_groups_add_up() {
        let seq = parser().parse("a200ms b300ms");

        assert!(seq.is_valid());
        assert_eq!(names(&seq), vec![vec!["a"], vec!["b"]]);
        assert_eq!(seq.total_duration_ms, 500);

        let seq = parser().parse("a500ms b748ms");
        assert_eq!(seq.total_duration_ms, 1248);
    }

    #[test]
    fn percent_out_of_range_is_invalid() {
        let seq = parser().parse("a101%");

        assert_eq!(seq.result, SequenceResult::Invalid);
        assert!(seq.groups.is_none());
        let failure = seq.failure.as_ref().expect("failure should be set");
        assert_eq!(failure.kind, ParseError::PercentOutOfRange(101.0));
        assert_eq!(failure.token, "101%");
        assert_eq!(failure.offset, 1);
        assert!(seq.error.contains("101%"));
    }

    #[test]
    fn chat_is_a_normal_message() {
        assert_eq!(parser().parse("hello there").result, SequenceResult::NormalMessage);
        assert_eq!(parser().parse("").result, SequenceResult::NormalMessage);
        assert_eq!(parser().parse("a b c").result, SequenceResult::NormalMessage);
        assert_eq!(parser().parse("a200msz").result, SequenceResult::NormalMessage);
    }

    #[test]
    fn start_cannot_be_held_long() {
        let seq = parser().parse("start600ms");

        assert_eq!(seq.result, SequenceResult::Invalid);
        assert_eq!(
            failure_kind(&seq),
            Some(&ParseError::StartDurationExceeded {
                duration_ms: 600,
                limit_ms: 500
            })
        );
        assert!(parser().parse("start499ms").is_valid());
    }

    #[test]
    fn holds_releases_and_simultaneous_groups() {
        let seq = parser().parse("_a17ms -x34ms y1024ms+b512ms");

        assert!(seq.is_valid());
        assert_eq!(names(&seq), vec![vec!["a"], vec!["x"], vec!["y", "b"]]);
        assert_eq!(seq.total_duration_ms, 17 + 34 + 1024);

        let groups = seq.groups();
        assert!(groups[0][0].hold && !groups[0][0].release);
        assert!(groups[1][0].release && !groups[1][0].hold);
    }

    #[test]
    fn wait_tokens_take_time() {
        let seq = parser().parse("a . b");
        assert_eq!(seq.total_duration_ms, 600);

        let seq = parser().parse("_a500ms b200ms #1s -a1300ms");
        assert!(seq.is_valid());
        assert_eq!(seq.total_duration_ms, 3000);
        assert_eq!(seq.groups()[2][0].duration_type, DurationType::Seconds);
    }

    #[test]
    fn hold_and_release_together_is_invalid() {
        let seq = parser().parse("_-a");
        assert_eq!(failure_kind(&seq), Some(&ParseError::HoldAndRelease));
    }

    #[test]
    fn trailing_simultaneous_is_invalid() {
        let seq = parser().parse("a+b+");

        assert_eq!(seq.result, SequenceResult::Invalid);
        assert_eq!(failure_kind(&seq), Some(&ParseError::TrailingSimultaneous));
        assert_eq!(seq.failure.as_ref().map(|f| f.offset), Some(3));
    }

    #[test]
    fn ports_are_one_based_and_bounded() {
        let seq = parser().parse("&2a");
        assert_eq!(seq.groups()[0][0].controller_port, 1);

        assert_eq!(failure_kind(&parser().parse("&0a")), Some(&ParseError::InvalidPort));
        assert_eq!(
            failure_kind(&parser().parse("&3a")),
            Some(&ParseError::PortAboveMax { port: 3, max: 2 })
        );
    }

    #[test]
    fn both_duration_kinds_are_invalid() {
        let seq = parser().parse("a200ms1s");
        assert_eq!(failure_kind(&seq), Some(&ParseError::BothDurations));
    }

    #[test]
    fn fractional_percent_and_seconds() {
        let seq = parser().parse("b50.75%1s");
        let input = &seq.groups()[0][0];

        assert_eq!(input.percent, 50.75);
        assert_eq!(input.duration_ms, 1000);
        assert_eq!(input.duration_type, DurationType::Seconds);

        let parsed = parser().parse("a1.25s");
        let input = &parsed.groups()[0][0];
        assert_eq!(input.duration_ms, 1250);
        assert_eq!(input.duration_type, DurationType::Milliseconds);

        assert!(parser().parse("a1.2500s").is_valid());
        assert_eq!(
            failure_kind(&parser().parse("a1.2505s")),
            Some(&ParseError::SubMillisecondDuration)
        );
    }

    #[test]
    fn durations_never_wrap() {
        let seq = parser().parse("a99999999999999999999ms");
        assert!(matches!(failure_kind(&seq), Some(ParseError::DurationOverflow(_))));

        let unchecked = ParserSettings {
            check_max_duration: false,
            ..Default::default()
        };
        let seq = parser_with(unchecked, Vec::new()).parse("a9223372036854775807ms b1ms");
        assert_eq!(
            failure_kind(&seq),
            Some(&ParseError::DurationOverflow("summing the sequence"))
        );
    }

    #[test]
    fn max_duration_is_enforced() {
        assert!(parser().parse("a30s b30s").is_valid());

        let seq = parser().parse("a30s b30s x1ms");
        assert_eq!(
            failure_kind(&seq),
            Some(&ParseError::MaxDurationExceeded {
                total_ms: 60_001,
                max_ms: 60_000
            })
        );

        let unchecked = ParserSettings {
            check_max_duration: false,
            ..Default::default()
        };
        assert!(parser_with(unchecked, Vec::new()).parse("a61s").is_valid());
    }

    #[test]
    fn dynamic_macro_expands_before_matching() {
        let parser = parser_with(
            ParserSettings::default(),
            vec![Macro::new("#mash(*)", "[<0>34ms #34ms]*20")],
        );
        let seq = parser.parse("#mash(a)");

        assert!(seq.is_valid());
        assert_eq!(seq.groups().len(), 40);
        assert_eq!(seq.total_duration_ms, 20 * 68);
    }

    #[test]
    fn synonyms_follow_the_console() {
        let parser = InputParser::new(
            Arc::new(MacroTable::default()),
            &SynonymTable::new([
                Synonym::new(ConsoleKind::GameCube, "jump", "a"),
                Synonym::new(ConsoleKind::Snes, "jump", "b"),
            ]),
            Arc::new(gamecube::capability()),
            ParserSettings::default(),
        );

        assert_eq!(names(&parser.parse("jump")), vec![vec!["a"]]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let parser = parser();
        for text in ["a+b 300ms", "_a17ms -x34ms y1024ms+b512ms", "a101%", "hi"] {
            assert_eq!(parser.parse(text), parser.parse(text));
        }
    }

    #[test]
    fn swap_leaves_loaded_parsers_untouched() {
        let shared = SharedParser::new(parser());
        let before = shared.load();

        let old = shared.swap(InputParser::new(
            Arc::new(MacroTable::default()),
            &SynonymTable::default(),
            Arc::new(gamecube::capability()),
            ParserSettings::default(),
        ));

        assert!(Arc::ptr_eq(&before, &old));
        assert!(before.parse("x").is_valid());
        assert!(shared.load().parse("cleft").is_valid());
        assert_eq!(shared.load().parse("select").result, SequenceResult::NormalMessage);
    }
}
