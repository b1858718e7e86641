// report.rs — Rendering of file reports
//
// Text: one `file:line:col: severity[code]: message` line per finding,
// followed by one `file:line:col: note: ...` line per trace entry.
// JSON: an array of per-file objects with every span resolved to a location.
//
// Preconditions: each report's spans index into its own source.
// Postconditions: output order follows report order, then finding order.
// Failure modes: JSON serialization errors are returned, never swallowed.
// Side effects: none.

use std::fmt::Write as _;

use serde::Serialize;

use crate::diag::{Diagnostic, Severity};
use crate::driver::FileReport;
use crate::source::{Location, SourceFile};

// ── Text ────────────────────────────────────────────────────────────────────

pub fn render_text(reports: &[FileReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let source = &report.source;
        for err in &report.parse_errors {
            let _ = writeln!(
                out,
                "{}: error: {}",
                source.span_location(err.span),
                err.message
            );
        }
        for diag in &report.diagnostics {
            render_diagnostic(&mut out, source, diag);
        }
    }
    out
}

fn render_diagnostic(out: &mut String, source: &SourceFile, diag: &Diagnostic) {
    let _ = writeln!(out, "{}: {}", source.span_location(diag.span), diag);
    for note in &diag.trace {
        let _ = writeln!(
            out,
            "{}: {}: {}",
            source.span_location(note.span),
            Severity::Note,
            note.message
        );
    }
}

/// `N warning(s), M error(s)` over every report.
pub fn summary(reports: &[FileReport]) -> String {
    let (mut warnings, mut errors) = (0, 0);
    for report in reports {
        errors += report.parse_errors.len();
        for diag in &report.diagnostics {
            match diag.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Note => {}
            }
        }
    }
    format!("{warnings} warning(s), {errors} error(s)")
}

// ── JSON ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct JsonNote {
    pub location: Location,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub code: Option<&'static str>,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    pub notes: Vec<JsonNote>,
}

#[derive(Debug, Serialize)]
pub struct JsonFileReport {
    pub file: String,
    pub source_sha256: String,
    pub parse_errors: Vec<JsonNote>,
    pub diagnostics: Vec<JsonDiagnostic>,
}

impl JsonFileReport {
    pub fn from_report(report: &FileReport) -> Self {
        let source = &report.source;
        JsonFileReport {
            file: report.file().to_string(),
            source_sha256: report.source_sha256.clone(),
            parse_errors: report
                .parse_errors
                .iter()
                .map(|e| JsonNote {
                    location: source.span_location(e.span),
                    message: e.message.clone(),
                })
                .collect(),
            diagnostics: report
                .diagnostics
                .iter()
                .map(|d| JsonDiagnostic {
                    code: d.code.map(|c| c.0),
                    severity: d.severity,
                    location: source.span_location(d.span),
                    message: d.message.clone(),
                    notes: d
                        .trace
                        .iter()
                        .map(|t| JsonNote {
                            location: source.span_location(t.span),
                            message: t.message.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

pub fn render_json(reports: &[FileReport]) -> Result<String, serde_json::Error> {
    let views: Vec<JsonFileReport> = reports.iter().map(JsonFileReport::from_report).collect();
    serde_json::to_string_pretty(&views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckConfig;
    use crate::driver::check_source;

    const LOOP: &str = "void f() {\n  int tid = get_local_id(0);\n  for (int i = 0; i < tid; i++) {}\n}\n";

    #[test]
    fn text_lists_finding_then_notes() {
        let report = check_source("k.cl", LOOP, &CheckConfig::default());
        let text = render_text(&[report]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("k.cl:3:19: warning[W0101]: backward branch (for loop)"));
        assert!(lines[1].starts_with("k.cl:2:7: note: assignment of identity-dependent variable 'tid'"));
    }

    #[test]
    fn json_resolves_locations() {
        let report = check_source("k.cl", LOOP, &CheckConfig::default());
        let json = render_json(&[report]).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let diag = &value[0]["diagnostics"][0];
        assert_eq!(diag["code"], "W0101");
        assert_eq!(diag["severity"], "warning");
        assert_eq!(diag["location"]["line"], 3);
        assert_eq!(diag["notes"][0]["location"]["line"], 2);
        assert_eq!(value[0]["file"], "k.cl");
    }

    #[test]
    fn summary_counts_parse_errors_as_errors() {
        let reports = vec![
            check_source("k.cl", LOOP, &CheckConfig::default()),
            check_source("bad.cl", "void f( {", &CheckConfig::default()),
        ];
        let s = summary(&reports);
        assert!(s.starts_with("1 warning(s), "));
        assert!(!s.ends_with(" 0 error(s)"));
    }
}
