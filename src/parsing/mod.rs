//! Text command parsing
//!
//! ```text
//!  raw chat line
//!       │
//!       ▼
//! ┌──────────────┐  strip ─ lowercase ─ macros ─ synonyms ─ [..]*N ─ strip ─ lowercase
//! │  Preparser   │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐  &port _ - name percent% Nms N.Ns +
//! │   Grammar    │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐  groups, total duration, Valid / Invalid / NormalMessage
//! │ InputParser  │
//! └──────────────┘
//! ```
//!
//! [`InputParser`] never fails on user text. Problems are reported through
//! [`ParsedInputSequence::result`] and its `error` string.

pub mod error;
pub mod grammar;
pub mod parser;
pub mod preparser;
pub mod reverse;
pub mod sequence;
pub mod tables;

pub use error::{ParseError, ParseFailure};
pub use grammar::Grammar;
pub use parser::{InputParser, ParserSettings, SharedParser};
pub use reverse::{reverse_parse, reverse_parse_natural, ReverseOptions, ShowDurations, ShowPorts};
pub use sequence::{DurationType, InputGroup, ParsedInput, ParsedInputSequence, SequenceResult};
pub use tables::{Macro, MacroTable, Synonym, SynonymTable};
