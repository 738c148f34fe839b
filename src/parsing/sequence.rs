use super::error::ParseFailure;
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationType {
    #[default]
    Milliseconds,
    Seconds,
}

/// One resolved action.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    pub name: String,
    /// 0-based.
    pub controller_port: u32,
    pub percent: f64,
    pub duration_ms: i64,
    pub duration_type: DurationType,
    pub hold: bool,
    pub release: bool,
}

impl ParsedInput {
    pub fn new(name: impl Into<String>, controller_port: u32, duration_ms: i64) -> Self {
        Self {
            name: name.into(),
            controller_port,
            percent: 100.0,
            duration_ms,
            duration_type: DurationType::Milliseconds,
            hold: false,
            release: false,
        }
    }
}

/// Inputs issued together.
pub type InputGroup = Vec<ParsedInput>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceResult {
    Valid,
    Invalid,
    NormalMessage,
}

impl Display for SequenceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceResult::Valid => write!(f, "Valid"),
            SequenceResult::Invalid => write!(f, "Invalid"),
            SequenceResult::NormalMessage => write!(f, "NormalMessage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInputSequence {
    pub result: SequenceResult,
    pub groups: Option<Vec<InputGroup>>,
    pub total_duration_ms: i64,
    /// User-facing diagnostic, empty unless `Invalid`.
    pub error: String,
    pub failure: Option<ParseFailure>,
}

impl ParsedInputSequence {
    pub fn valid(groups: Vec<InputGroup>, total_duration_ms: i64) -> Self {
        Self {
            result: SequenceResult::Valid,
            groups: Some(groups),
            total_duration_ms,
            error: String::new(),
            failure: None,
        }
    }

    pub fn invalid(failure: ParseFailure) -> Self {
        Self {
            result: SequenceResult::Invalid,
            groups: None,
            total_duration_ms: 0,
            error: failure.to_string(),
            failure: Some(failure),
        }
    }

    pub fn normal_message() -> Self {
        Self {
            result: SequenceResult::NormalMessage,
            groups: None,
            total_duration_ms: 0,
            error: String::new(),
            failure: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.result == SequenceResult::Valid
    }

    /// The groups of a `Valid` sequence, empty otherwise.
    pub fn groups(&self) -> &[InputGroup] {
        self.groups.as_deref().unwrap_or(&[])
    }
}
