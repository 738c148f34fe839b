//! Grammar fragments and the sequencing layer that combines them.
//!
//! One input token is, in this fixed order:
//!
//! ```text
//! [&port] [_] [-] name [percent%] [Nms] [N(.N)s] [+]
//!   │      │   │   │        │        │      │     └─ simultaneous with the next token
//!   │      │   │   │        │        │      └─ seconds
//!   │      │   │   │        │        └─ milliseconds
//!   │      │   │   │        └─ percent, decimals allowed
//!   │      │   │   └─ required, longest valid name first
//!   │      │   └─ release
//!   │      └─ hold
//!   └─ controller port, 1-based
//! ```
//!
//! Every fragment is its own `nom` parser. [`Grammar::match_at`] runs them in
//! order and records where each optional piece matched, so validation can
//! point at the exact token that broke a rule.

use nom::{
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    error::{Error, ErrorKind},
    sequence::{pair, preceded, terminated},
    Err, IResult,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarFragment {
    Port,
    Hold,
    Release,
    InputName,
    Percent,
    Milliseconds,
    Seconds,
    Simultaneous,
}

impl GrammarFragment {
    /// The order fragments are matched in.
    pub const ORDER: [GrammarFragment; 8] = [
        GrammarFragment::Port,
        GrammarFragment::Hold,
        GrammarFragment::Release,
        GrammarFragment::InputName,
        GrammarFragment::Percent,
        GrammarFragment::Milliseconds,
        GrammarFragment::Seconds,
        GrammarFragment::Simultaneous,
    ];

    pub fn capture_name(self) -> &'static str {
        match self {
            GrammarFragment::Port => "port",
            GrammarFragment::Hold => "hold",
            GrammarFragment::Release => "release",
            GrammarFragment::InputName => "input",
            GrammarFragment::Percent => "percent",
            GrammarFragment::Milliseconds => "ms",
            GrammarFragment::Seconds => "s",
            GrammarFragment::Simultaneous => "simultaneous",
        }
    }

    pub fn is_required(self) -> bool {
        self == GrammarFragment::InputName
    }

    fn pattern(self, input_names: &[String]) -> String {
        let body = match self {
            GrammarFragment::Port => r"&\d+".to_string(),
            GrammarFragment::Hold => "_".to_string(),
            GrammarFragment::Release => "-".to_string(),
            GrammarFragment::InputName if input_names.is_empty() => r"[^\s\S]".to_string(),
            GrammarFragment::InputName => input_names
                .iter()
                .map(|name| escape_pattern(name))
                .collect::<Vec<_>>()
                .join("|"),
            GrammarFragment::Percent => r"\d+(\.\d+)?%".to_string(),
            GrammarFragment::Milliseconds => r"\d+ms".to_string(),
            GrammarFragment::Seconds => r"\d+(\.\d+)?s".to_string(),
            GrammarFragment::Simultaneous => r"\+".to_string(),
        };

        let group = format!("(?<{}>{})", self.capture_name(), body);
        if self.is_required() {
            group
        } else {
            format!("{group}?")
        }
    }
}

fn escape_pattern(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if r"\.+*?()|[]{}^$#&-".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn port(input: &str) -> IResult<&str, &str> {
    recognize(preceded(char('&'), digit1))(input)
}

fn hold(input: &str) -> IResult<&str, &str> {
    recognize(char('_'))(input)
}

fn release(input: &str) -> IResult<&str, &str> {
    recognize(char('-'))(input)
}

fn decimal(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

fn percent(input: &str) -> IResult<&str, &str> {
    recognize(terminated(decimal, char('%')))(input)
}

fn milliseconds(input: &str) -> IResult<&str, &str> {
    recognize(terminated(digit1, tag("ms")))(input)
}

fn seconds(input: &str) -> IResult<&str, &str> {
    recognize(terminated(decimal, char('s')))(input)
}

fn simultaneous(input: &str) -> IResult<&str, &str> {
    recognize(char('+'))(input)
}

/// A matched fragment and its byte offset in the full message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'t> {
    pub offset: usize,
    pub text: &'t str,
}

/// One input token found by [`Grammar::match_at`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputMatch<'t> {
    pub start: usize,
    pub end: usize,
    pub text: &'t str,
    pub port: Option<Span<'t>>,
    pub hold: Option<Span<'t>>,
    pub release: Option<Span<'t>>,
    pub name: Option<Span<'t>>,
    pub percent: Option<Span<'t>>,
    pub milliseconds: Option<Span<'t>>,
    pub seconds: Option<Span<'t>>,
    pub simultaneous: Option<Span<'t>>,
}

impl<'t> InputMatch<'t> {
    fn set(&mut self, fragment: GrammarFragment, span: Span<'t>) {
        let slot = match fragment {
            GrammarFragment::Port => &mut self.port,
            GrammarFragment::Hold => &mut self.hold,
            GrammarFragment::Release => &mut self.release,
            GrammarFragment::InputName => &mut self.name,
            GrammarFragment::Percent => &mut self.percent,
            GrammarFragment::Milliseconds => &mut self.milliseconds,
            GrammarFragment::Seconds => &mut self.seconds,
            GrammarFragment::Simultaneous => &mut self.simultaneous,
        };
        *slot = Some(span);
    }
}

/// The assembled grammar for one console's input names.
#[derive(Debug, Clone)]
pub struct Grammar {
    // Longest first, so "cleft" is tried before "c".
    input_names: Vec<String>,
    pattern: String,
}

impl Grammar {
    pub fn assemble(valid_inputs: &[String]) -> Self {
        let mut input_names: Vec<String> = valid_inputs
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| name.to_lowercase())
            .collect();
        input_names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        input_names.dedup();

        let pattern: String = GrammarFragment::ORDER
            .iter()
            .map(|fragment| fragment.pattern(&input_names))
            .collect();
        debug!("Assembled grammar for {} inputs: {}", input_names.len(), pattern);

        Self {
            input_names,
            pattern,
        }
    }

    /// The combined pattern in regular-expression notation.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn input_name<'t>(&self, input: &'t str) -> IResult<&'t str, &'t str> {
        self.input_names
            .iter()
            .find(|name| input.starts_with(name.as_str()))
            .map(|name| (&input[name.len()..], &input[..name.len()]))
            .ok_or_else(|| Err::Error(Error::new(input, ErrorKind::Tag)))
    }

    fn parse_fragment<'t>(
        &self,
        fragment: GrammarFragment,
        input: &'t str,
    ) -> IResult<&'t str, &'t str> {
        match fragment {
            GrammarFragment::Port => port(input),
            GrammarFragment::Hold => hold(input),
            GrammarFragment::Release => release(input),
            GrammarFragment::InputName => self.input_name(input),
            GrammarFragment::Percent => percent(input),
            GrammarFragment::Milliseconds => milliseconds(input),
            GrammarFragment::Seconds => seconds(input),
            GrammarFragment::Simultaneous => simultaneous(input),
        }
    }

    /// Matches one token starting exactly at byte `start`.
    pub fn match_at<'t>(&self, text: &'t str, start: usize) -> Option<InputMatch<'t>> {
        let mut found = InputMatch {
            start,
            ..Default::default()
        };
        let mut rest = text.get(start..)?;

        // Each fragment consumes from where the previous one stopped
        for fragment in GrammarFragment::ORDER {
            let offset = text.len() - rest.len();
            match self.parse_fragment(fragment, rest) {
                Ok((next, matched)) => {
                    found.set(
                        fragment,
                        Span {
                            offset,
                            text: matched,
                        },
                    );
                    rest = next;
                }
                Err(_) if fragment.is_required() => return None,
                Err(_) => {}
            }
        }

        found.end = text.len() - rest.len();
        found.text = &text[start..found.end];
        Some(found)
    }

    /// All non-overlapping tokens, scanning left to right.
    pub fn matches<'g, 't>(&'g self, text: &'t str) -> Matches<'g, 't> {
        Matches {
            grammar: self,
            text,
            pos: 0,
        }
    }
}

pub struct Matches<'g, 't> {
    grammar: &'g Grammar,
    text: &'t str,
    pos: usize,
}

impl<'t> Iterator for Matches<'_, 't> {
    type Item = InputMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            if let Some(found) = self.grammar.match_at(self.text, self.pos) {
                self.pos = found.end;
                return Some(found);
            }
            // No token here, move on by one character
            let step = self.text[self.pos..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            self.pos += step;
        }
        None
    }
}
