//! Text-to-text stages that run before grammar matching.
//!
//! ```text
//! raw ─► strip ─► lowercase ─► macros ─► synonyms ─► expand ─► strip ─► lowercase ─► grammar
//! ```
//!
//! No stage can fail. Text a stage does not understand is passed through
//! untouched and left for the grammar to reject.

use super::tables::{ConsoleSynonyms, MacroTable, MACRO_START};
use std::sync::Arc;
use tracing::{debug, warn};

/// Expansion stops growing a message past this many bytes.
pub const MAX_EXPANDED_LEN: usize = 32 * 1024;

/// Placeholder for one argument in a dynamic macro name: `#mash(*)`.
const DYNAMIC_ARG_PLACEHOLDER: &str = "*";
const DYNAMIC_ARG_SEPARATOR: char = ',';

pub trait Preparser: Send + Sync {
    fn preparse(&self, message: &str) -> String;

    /// Short stage name for logging.
    fn name(&self) -> &'static str;
}

pub struct RemoveWhitespace;

impl Preparser for RemoveWhitespace {
    fn preparse(&self, message: &str) -> String {
        message.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn name(&self) -> &'static str {
        "strip"
    }
}

pub struct Lowercase;

impl Preparser for Lowercase {
    fn preparse(&self, message: &str) -> String {
        message.to_lowercase()
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

/// Replaces `#name` and `#name(args)` with macro expansions.
pub struct MacroPreparser {
    macros: Arc<MacroTable>,
    max_recursion: usize,
}

impl MacroPreparser {
    pub fn new(macros: Arc<MacroTable>, max_recursion: usize) -> Self {
        Self {
            macros,
            max_recursion,
        }
    }

    /// Expands every macro in `text`, or `None` if the result would be longer
    /// than `limit` bytes. The top level instead stops at the first macro
    /// that does not fit and keeps the rest of the message as written.
    fn expand(&self, text: &str, depth: usize, limit: usize) -> Option<String> {
        let top = depth == 0;
        if depth >= self.max_recursion || !text.contains(MACRO_START) {
            return (top || text.len() <= limit).then(|| text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut pos = 0;

        while let Some(found) = text[pos..].find(MACRO_START) {
            let start = pos + found;
            let name_start = start + MACRO_START.len_utf8();
            let name_end = text[name_start..]
                .find(|c: char| c == MACRO_START || c == '(' || c.is_whitespace())
                .map_or(text.len(), |i| name_start + i);

            // A lone '#' is a wait token, not a macro.
            if name_end == name_start {
                pos = name_start;
                continue;
            }

            let token = &text[start..name_end];
            let dynamic_close = if text[name_end..].starts_with('(') {
                matching_paren(text, name_end).filter(|&close| close > name_end + 1)
            } else {
                None
            };

            // Resolve what the token is and how much of the text it covers.
            let (call, token_end) = match dynamic_close {
                Some(close) => {
                    pos = close + 1;
                    (MacroCall::Dynamic(&text[name_end + 1..close]), close + 1)
                }
                None => {
                    pos = name_end;
                    match self.macros.longest_prefix(token) {
                        Some((name, expansion)) => (MacroCall::Plain(expansion), start + name.len()),
                        None => continue,
                    }
                }
            };

            // Whatever the rest of the text does not use is left for the value.
            let kept = out.len() + (start - copied) + (text.len() - token_end);
            let room = limit.saturating_sub(kept);

            let expansion = match call {
                MacroCall::Plain(expansion) => self
                    .expand(expansion, depth + 1, room)
                    .map_or(Expansion::TooLong, Expansion::Value),
                MacroCall::Dynamic(args) => self.expand_dynamic(token, args, depth, room),
            };

            match expansion {
                Expansion::Unknown => {}
                Expansion::Value(value) => {
                    out.push_str(&text[copied..start]);
                    out.push_str(&value);
                    copied = token_end;
                }
                Expansion::TooLong if top => {
                    warn!(
                        "Macro {} would grow the message past {} bytes, leaving the rest unexpanded",
                        token, limit
                    );
                    break;
                }
                Expansion::TooLong => return None,
            }
        }

        out.push_str(&text[copied..]);
        (top || out.len() <= limit).then_some(out)
    }

    fn expand_dynamic(&self, token: &str, args: &str, depth: usize, limit: usize) -> Expansion {
        let Some(args) = self.expand(args, depth + 1, MAX_EXPANDED_LEN) else {
            return Expansion::TooLong;
        };
        let args: Vec<&str> = args.split(DYNAMIC_ARG_SEPARATOR).collect();

        let generic = format!(
            "{}({})",
            token,
            vec![DYNAMIC_ARG_PLACEHOLDER; args.len()].join(",")
        );
        let Some(template) = self.macros.get(&generic) else {
            return Expansion::Unknown;
        };

        // Fill <0>, <1>, ... with the arguments in order.
        let mut value = template.to_string();
        for (i, arg) in args.iter().enumerate() {
            value = value.replace(&format!("<{i}>"), arg);
        }

        self.expand(&value, depth + 1, limit)
            .map_or(Expansion::TooLong, Expansion::Value)
    }
}

enum MacroCall<'a> {
    /// Expansion text of the longest macro name prefixing the token.
    Plain(&'a str),
    /// Raw argument list between the parentheses.
    Dynamic(&'a str),
}

enum Expansion {
    /// No macro by that name; the token stays as written.
    Unknown,
    Value(String),
    TooLong,
}

impl Preparser for MacroPreparser {
    fn preparse(&self, message: &str) -> String {
        if self.macros.is_empty() {
            return message.to_string();
        }
        self.expand(message, 0, MAX_EXPANDED_LEN)
            .unwrap_or_else(|| message.to_string())
    }

    fn name(&self) -> &'static str {
        "macros"
    }
}

/// Byte index of the `)` closing the `(` at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Console-scoped literal replacement.
pub struct SynonymPreparser {
    synonyms: ConsoleSynonyms,
}

impl SynonymPreparser {
    pub fn new(synonyms: ConsoleSynonyms) -> Self {
        Self { synonyms }
    }
}

impl Preparser for SynonymPreparser {
    fn preparse(&self, message: &str) -> String {
        if self.synonyms.is_empty() {
            return message.to_string();
        }

        let mut firsts: Vec<char> = message.chars().collect();
        firsts.sort_unstable();
        firsts.dedup();

        let mut candidates: Vec<(&str, &str)> = firsts
            .iter()
            .flat_map(|c| self.synonyms.starting_with(*c))
            .collect();
        candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut out = message.to_string();
        for (name, value) in candidates {
            if out.contains(name) {
                out = out.replace(name, value);
            }
        }
        out
    }

    fn name(&self) -> &'static str {
        "synonyms"
    }
}

/// Expands `[body]*N` into N copies of `body`, innermost groups first.
pub struct ExpandPreparser;

#[derive(Debug, PartialEq)]
struct Repetition {
    open: usize,
    close: usize,
    end: usize,
    count: usize,
}

fn find_repetition(text: &str) -> Option<Repetition> {
    for (open, _) in text.match_indices('[') {
        let body_start = open + 1;
        let Some(rel) = text[body_start..].find(|c: char| c == '[' || c == ']') else {
            return None;
        };
        let close = body_start + rel;
        if text[close..].starts_with('[') {
            continue;
        }

        let Some(after) = text[close + 1..].strip_prefix('*') else {
            continue;
        };
        let digits = after
            .bytes()
            .take(3)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            continue;
        }
        let Ok(count) = after[..digits].parse::<usize>() else {
            continue;
        };

        return Some(Repetition {
            open,
            close,
            end: close + 2 + digits,
            count,
        });
    }
    None
}

impl Preparser for ExpandPreparser {
    fn preparse(&self, message: &str) -> String {
        let mut text = message.to_string();

        while let Some(rep) = find_repetition(&text) {
            let body = &text[rep.open + 1..rep.close];
            let grown = text.len() - (rep.end - rep.open) + body.len() * rep.count;
            if grown > MAX_EXPANDED_LEN {
                warn!(
                    "Repetition would grow the message to {} bytes, leaving it unexpanded",
                    grown
                );
                break;
            }

            let mut expanded = String::with_capacity(grown);
            expanded.push_str(&text[..rep.open]);
            for _ in 0..rep.count {
                expanded.push_str(body);
            }
            expanded.push_str(&text[rep.end..]);
            text = expanded;
        }

        text
    }

    fn name(&self) -> &'static str {
        "expand"
    }
}

/// An ordered list of stages applied one after another.
pub struct PreparserChain {
    stages: Vec<Box<dyn Preparser>>,
}

impl PreparserChain {
    pub fn new(stages: Vec<Box<dyn Preparser>>) -> Self {
        Self { stages }
    }

    /// The standard pipeline: strip, lowercase, macros, synonyms, expand,
    /// then strip and lowercase again.
    pub fn standard(
        macros: Arc<MacroTable>,
        synonyms: ConsoleSynonyms,
        max_recursion: usize,
    ) -> Self {
        Self::new(vec![
            Box::new(RemoveWhitespace),
            Box::new(Lowercase),
            Box::new(MacroPreparser::new(macros, max_recursion)),
            Box::new(SynonymPreparser::new(synonyms)),
            Box::new(ExpandPreparser),
            Box::new(RemoveWhitespace),
            Box::new(Lowercase),
        ])
    }

    pub fn preparse(&self, message: &str) -> String {
        let mut text = message.to_string();
        for stage in &self.stages {
            text = stage.preparse(&text);
            debug!("Preparser stage {}: \"{}\"", stage.name(), text);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleKind;
    use crate::parsing::tables::{Macro, Synonym, SynonymTable};

    fn macro_stage(macros: Vec<Macro>) -> MacroPreparser {
        MacroPreparser::new(Arc::new(MacroTable::new(macros)), 10)
    }

    #[test]
    fn expand_nested_repetitions() {
        assert_eq!(
            ExpandPreparser.preparse("[a#17ms[b]*3x]*2"),
            "a#17msbbbxa#17msbbbx"
        );
        assert_eq!(
            ExpandPreparser.preparse("r[#17msa+b]*2b"),
            "r#17msa+b#17msa+bb"
        );
    }

    #[test]
    fn expand_zero_removes_group() {
        assert_eq!(ExpandPreparser.preparse("a[b]*0c"), "ac");
    }

    #[test]
    fn expand_leaves_malformed_groups() {
        assert_eq!(ExpandPreparser.preparse("[a]"), "[a]");
        assert_eq!(ExpandPreparser.preparse("[a]*"), "[a]*");
        assert_eq!(ExpandPreparser.preparse("[a"), "[a");
        assert_eq!(
            ExpandPreparser.preparse("[a]*1234"),
            format!("{}4", "a".repeat(123))
        );
    }

    #[test]
    fn expand_stops_at_size_limit() {
        let text = "[[[a]*999]*999]*999";
        let out = ExpandPreparser.preparse(text);
        assert!(out.len() <= MAX_EXPANDED_LEN);
        assert!(out.contains('['));
    }

    #[test]
    fn plain_macro_keeps_token_remainder() {
        let stage = macro_stage(vec![Macro::new("#jump", "b500ms")]);

        assert_eq!(stage.preparse("#jump"), "b500ms");
        assert_eq!(stage.preparse("a#jumpa"), "ab500msa");
        assert_eq!(stage.preparse("#jump#jump"), "b500msb500ms");
        assert_eq!(stage.preparse("#17ms"), "#17ms");
    }

    #[test]
    fn nested_macros_expand() {
        let stage = macro_stage(vec![
            Macro::new("#jump", "b500ms"),
            Macro::new("#doublejump", "#jump #jump"),
        ]);

        assert_eq!(stage.preparse("#doublejump"), "b500ms b500ms");
    }

    #[test]
    fn dynamic_macro_fills_arguments() {
        let stage = macro_stage(vec![
            Macro::new("#mash(*)", "[<0>34ms#34ms]*2"),
            Macro::new("#mashalt(*,*)", "[<0>34ms#34ms<1>34ms#34ms]*2"),
        ]);

        assert_eq!(stage.preparse("#mash(a)"), "[a34ms#34ms]*2");
        assert_eq!(
            stage.preparse("#mashalt(a,b)"),
            "[a34ms#34msb34ms#34ms]*2"
        );
        assert_eq!(stage.preparse("#mash(a,b)"), "#mash(a,b)");
    }

    #[test]
    fn recursion_is_bounded() {
        let stage = macro_stage(vec![Macro::new("#loop", "a#loop")]);
        let out = stage.preparse("#loop");

        assert_eq!(out, format!("{}#loop", "a".repeat(10)));
    }

    #[test]
    fn fan_out_macros_stop_at_size_limit() {
        let stage = macro_stage(vec![
            Macro::new("#x", "#x#x#x#x"),
            Macro::new("#jump", "b500ms"),
        ]);

        let out = stage.preparse(&"#x".repeat(10));
        assert!(out.len() <= MAX_EXPANDED_LEN);
        assert_eq!(out, "#x".repeat(10));

        // Macros before the one that does not fit still expand.
        assert_eq!(stage.preparse("#jump#x#jump"), "b500ms#x#jump");
    }

    #[test]
    fn dynamic_macro_arguments_are_bounded() {
        let stage = macro_stage(vec![
            Macro::new("#x", "#x#x#x#x"),
            Macro::new("#mash(*)", "[<0>34ms#34ms]*2"),
        ]);

        let out = stage.preparse("#mash(#x)");
        assert!(out.len() <= MAX_EXPANDED_LEN);
        assert_eq!(out, "#mash(#x)");
    }

    #[test]
    fn synonyms_replace_longest_first() {
        let table = SynonymTable::new([
            Synonym::new(ConsoleKind::Snes, "jump", "b"),
            Synonym::new(ConsoleKind::Snes, "j", "y"),
        ]);
        let stage = SynonymPreparser::new(table.for_console(ConsoleKind::Snes));

        assert_eq!(stage.preparse("jump+j"), "b+y");
    }

    #[test]
    fn standard_chain_order() {
        let macros = Arc::new(MacroTable::new([Macro::new("#jump", "_B 500ms")]));
        let synonyms = SynonymTable::new([Synonym::new(ConsoleKind::Snes, "hop", "#jump")]);
        let chain = PreparserChain::standard(macros, synonyms.for_console(ConsoleKind::Snes), 10);

        assert_eq!(chain.preparse(" #JUMP [a]*2 "), "_b500msaa");
        // Synonyms run after macros, so a synonym cannot introduce one.
        assert_eq!(chain.preparse("hop"), "#jump");
    }
}
