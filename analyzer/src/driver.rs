// driver.rs — Run orchestration
//
// lex → parse → resolve → walk for one source text, and the same for many
// files in parallel. Every file gets its own `AnalysisContext`; nothing is
// shared between files except the read-only configuration.
//
// Preconditions: none.
// Postconditions: `check_files` returns one result per input path, in input
//   order.
// Failure modes: unreadable sources and configs produce `DriverError`.
//   Parse errors are part of the report, not failures.
// Side effects: reads files; `log::info!` per file.

use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ast::Span;
use crate::config::CheckConfig;
use crate::diag::Diagnostic;
use crate::engine::AnalysisContext;
use crate::parser;
use crate::resolve::resolve;
use crate::source::SourceFile;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cannot read '{}'", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read config '{}'", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{}'", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A syntax error with its message rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub span: Span,
    pub message: String,
}

/// Results for one source file.
#[derive(Debug)]
pub struct FileReport {
    pub source: SourceFile,
    /// Lowercase hex SHA-256 of the source text.
    pub source_sha256: String,
    pub parse_errors: Vec<SyntaxError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn file(&self) -> &str {
        self.source.name()
    }

    /// A parse error or an error-severity finding.
    pub fn has_errors(&self) -> bool {
        !self.parse_errors.is_empty() || self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Analyze one source text. Checks run on whatever the parser recovered,
/// even when there are syntax errors.
pub fn check_source(name: &str, text: &str, config: &CheckConfig) -> FileReport {
    let source = SourceFile::new(name, text);
    let parsed = parser::parse(text);
    let parse_errors: Vec<SyntaxError> = parsed
        .errors
        .iter()
        .map(|e| SyntaxError {
            span: *e.span(),
            message: e.to_string(),
        })
        .collect();
    if !parse_errors.is_empty() {
        warn!("{name}: {} syntax error(s)", parse_errors.len());
    }

    let diagnostics = match &parsed.unit {
        Some(unit) => {
            let resolved = resolve(unit);
            AnalysisContext::new(&resolved, config, &source)
                .run(unit)
                .diagnostics
        }
        None => Vec::new(),
    };
    info!("{name}: {} finding(s)", diagnostics.len());

    FileReport {
        source_sha256: sha256_hex(text),
        source,
        parse_errors,
        diagnostics,
    }
}

pub fn check_file(path: &Path, config: &CheckConfig) -> Result<FileReport, DriverError> {
    let text = std::fs::read_to_string(path).map_err(|source| DriverError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(check_source(&path.display().to_string(), &text, config))
}

/// Analyze many files in parallel, one independent context per file.
pub fn check_files(paths: &[PathBuf], config: &CheckConfig) -> Vec<Result<FileReport, DriverError>> {
    paths
        .par_iter()
        .map(|path| check_file(path, config))
        .collect()
}

pub fn load_config(path: &Path) -> Result<CheckConfig, DriverError> {
    let text = std::fs::read_to_string(path).map_err(|source| DriverError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    CheckConfig::from_json(&text).map_err(|source| DriverError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_text() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn clean_kernel_has_no_findings() {
        let report = check_source(
            "k.cl",
            "__kernel void k(__global int *a) { int i = get_global_id(0); a[i] = 0; }",
            &CheckConfig::default(),
        );
        assert!(report.parse_errors.is_empty());
        assert!(report.diagnostics.is_empty());
        assert!(!report.has_errors());
        assert_eq!(report.file(), "k.cl");
    }

    #[test]
    fn syntax_error_is_reported_not_fatal() {
        let report = check_source("bad.cl", "void f( { }", &CheckConfig::default());
        assert!(!report.parse_errors.is_empty());
        assert!(report.has_errors());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = check_file(Path::new("/nonexistent/k.cl"), &CheckConfig::default())
            .expect_err("missing file");
        assert!(matches!(err, DriverError::Read { .. }));
        assert_eq!(err.to_string(), "cannot read '/nonexistent/k.cl'");
        // The I/O cause is carried as the source, not repeated in the message.
        assert!(std::error::Error::source(&err).is_some());
        let chained = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chained.matches("No such file").count(), 1, "{chained}");
    }

    #[test]
    fn files_keep_input_order() {
        let paths = vec![PathBuf::from("/nonexistent/a.cl"), PathBuf::from("/nonexistent/b.cl")];
        let results = check_files(&paths, &CheckConfig::default());
        let names: Vec<_> = results
            .iter()
            .map(|r| match r {
                Err(DriverError::Read { path, .. }) => path.display().to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(names, vec!["/nonexistent/a.cl", "/nonexistent/b.cl"]);
    }
}
