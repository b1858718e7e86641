// diag.rs — Unified diagnostics model
//
// Provides the diagnostic types shared by every check. A diagnostic has a
// primary span, a severity, a stable code and an ordered list of trace
// entries (attached notes) explaining how the condition arose.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `W0101`, `E0301`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Identity-dependent loop condition.
    pub const BACKWARD_BRANCH: DiagCode = DiagCode("W0101");
    /// Barrier inside an identity-dependent conditional construct.
    pub const CONDITIONAL_BARRIER: DiagCode = DiagCode("W0201");
    /// Call that closes a cycle in the call graph.
    pub const RECURSIVE_CALL: DiagCode = DiagCode("E0301");
    /// Kernel that synchronises but never queries its identity.
    pub const SINGLE_WORK_ITEM_BARRIER: DiagCode = DiagCode("W0401");
}

// ── Severity level ───────────────────────────────────────────────────────

/// `Note` only ever appears on trace entries; a standalone diagnostic is a
/// warning or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

// ── Trace entry ──────────────────────────────────────────────────────────

/// One attached note: a location plus an explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub span: Span,
    pub message: String,
}

impl TraceEntry {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        TraceEntry {
            span,
            message: message.into(),
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A finding emitted by any check.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    pub trace: Vec<TraceEntry>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code and no trace.
    pub fn new(severity: Severity, span: Span, message: impl Into<String>) -> Self {
        debug_assert!(severity != Severity::Note, "notes attach to a diagnostic");
        Self {
            code: None,
            severity,
            span,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, span, message)
    }

    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, span, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach one trace note.
    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.trace.push(TraceEntry::new(span, message));
        self
    }

    /// Attach trace notes, preserving order.
    pub fn with_trace(mut self, entries: impl IntoIterator<Item = TraceEntry>) -> Self {
        self.trace.extend(entries);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", self.severity, code, self.message)
        } else {
            write!(f, "{}: {}", self.severity, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        (0..1).into()
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::error(dummy_span(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::warning(dummy_span(), "loop is identity-dependent")
            .with_code(codes::BACKWARD_BRANCH);
        assert_eq!(
            format!("{d}"),
            "warning[W0101]: loop is identity-dependent"
        );
    }

    #[test]
    fn builder_chain_keeps_note_order() {
        let d = Diagnostic::warning(dummy_span(), "barrier may not be reachable")
            .with_code(codes::CONDITIONAL_BARRIER)
            .with_note(dummy_span(), "first")
            .with_trace(vec![
                TraceEntry::new(dummy_span(), "second"),
                TraceEntry::new(dummy_span(), "third"),
            ]);

        assert_eq!(d.code, Some(codes::CONDITIONAL_BARRIER));
        let messages: Vec<_> = d.trace.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert!(!d.is_error());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }
}
