//! The contract string attached to every subtask.
//!
//! A [`ContextScope`] is a structured plain-text contract: it opens with the
//! literal header `CONTRACT DEFINITION:` on its own line, followed by four
//! numbered sections in fixed order. Section bodies are free-form and may
//! span multiple lines. The format is validated at construction and again
//! whenever a registry is deserialized, so a `ContextScope` held in memory
//! is always well-formed.

use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Required opening line of every contract.
pub const CONTRACT_HEADER: &str = "CONTRACT DEFINITION:\n";

/// The four contract sections, in the order they must appear.
pub const SECTION_MARKERS: [&str; 4] = [
    "1. RESEARCH NOTE:",
    "2. INPUT:",
    "3. LOGIC:",
    "4. OUTPUT:",
];

/// One of the four numbered contract sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractSection {
    ResearchNote,
    Input,
    Logic,
    Output,
}

impl ContractSection {
    fn marker(self) -> &'static str {
        match self {
            Self::ResearchNote => SECTION_MARKERS[0],
            Self::Input => SECTION_MARKERS[1],
            Self::Logic => SECTION_MARKERS[2],
            Self::Output => SECTION_MARKERS[3],
        }
    }
}

/// Malformed contract string.
#[derive(Debug, Error, Diagnostic)]
pub enum ContextScopeError {
    #[error("contract must start with {CONTRACT_HEADER:?}")]
    #[diagnostic(
        code(taskloom::tasks::contract_header),
        help("The header line is literal and case-sensitive.")
    )]
    MissingHeader,

    #[error("contract section {marker:?} is missing or out of order")]
    #[diagnostic(
        code(taskloom::tasks::contract_section),
        help("Sections must appear as 1. RESEARCH NOTE:, 2. INPUT:, 3. LOGIC:, 4. OUTPUT:.")
    )]
    SectionOrder { marker: &'static str },
}

/// Validated contract string for a subtask.
///
/// ```rust
/// use taskloom::tasks::{ContextScope, ContractSection};
///
/// let scope = ContextScope::new(
///     "CONTRACT DEFINITION:\n\
///      1. RESEARCH NOTE: consult the persistence layer docs\n\
///      2. INPUT: a parsed Backlog\n\
///      3. LOGIC: serialize and write atomically\n\
///      4. OUTPUT: tasks.json on disk\n",
/// )
/// .unwrap();
/// assert!(scope.section(ContractSection::Input).contains("Backlog"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextScope(String);

impl ContextScope {
    /// Validate and wrap a raw contract string.
    pub fn new(raw: impl Into<String>) -> Result<Self, ContextScopeError> {
        let raw = raw.into();
        if !raw.starts_with(CONTRACT_HEADER) {
            return Err(ContextScopeError::MissingHeader);
        }
        let mut cursor = CONTRACT_HEADER.len();
        for marker in SECTION_MARKERS {
            match raw[cursor..].find(marker) {
                Some(offset) => cursor += offset + marker.len(),
                None => return Err(ContextScopeError::SectionOrder { marker }),
            }
        }
        Ok(Self(raw))
    }

    /// The full contract text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The body of one section, trimmed, excluding the marker of the next.
    #[must_use]
    pub fn section(&self, section: ContractSection) -> &str {
        let marker = section.marker();
        // new() guarantees every marker is present, in order.
        let start = self.0.find(marker).map(|i| i + marker.len()).unwrap_or(0);
        let rest = &self.0[start..];
        let end = SECTION_MARKERS
            .iter()
            .filter_map(|m| rest.find(m))
            .min()
            .unwrap_or(rest.len());
        rest[..end].trim()
    }
}

impl fmt::Display for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContextScope {
    type Error = ContextScopeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ContextScope> for String {
    fn from(scope: ContextScope) -> Self {
        scope.0
    }
}
