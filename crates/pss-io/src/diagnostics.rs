//! Import diagnostics with severity levels.
//!
//! Imports keep going when an element cannot be used, collecting issues for
//! user visibility instead of failing on the first malformed record. Hard
//! failure is the caller's decision, typically via
//! [`crate::load_network`] or [`crate::validate::assert_valid`].

use pss_core::Network;
use serde::Serialize;

/// Severity level for import issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning, // Unusual but imported (e.g., defaulted value)
    Error,   // Could not import element or dataset is unusable
}

/// A single issue encountered during import or validation
#[derive(Debug, Clone, Serialize)]
pub struct ImportIssue {
    pub severity: Severity,
    pub category: String, // "parse", "validation", "reference"
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>, // "bus 14", "line 22"
}

/// Statistics about the import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub buses: usize,
    pub lines: usize,
    pub sources: usize,
    pub loads: usize,
    pub skipped: usize,
}

/// Complete diagnostics for an import operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportDiagnostics {
    pub stats: ImportStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ImportIssue>,
}

impl ImportDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning issue
    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            category: category.to_string(),
            message: message.to_string(),
            entity: None,
        });
    }

    /// Add an error
    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Error,
            category: category.to_string(),
            message: message.to_string(),
            entity: None,
        });
    }

    /// Add an error with an entity reference (e.g., "line 22")
    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Error,
            category: category.to_string(),
            message: message.to_string(),
            entity: Some(entity.to_string()),
        });
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Count errors
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// First error message, for one-line hard failures
    pub fn first_error(&self) -> Option<&str> {
        self.issues
            .iter()
            .find(|i| i.severity == Severity::Error)
            .map(|i| i.message.as_str())
    }

    /// Merge another diagnostics into this one (parse + validation)
    pub fn merge(&mut self, other: ImportDiagnostics) {
        self.issues.extend(other.issues);
    }
}

/// Result of an import operation
pub struct ImportResult {
    pub network: Network,
    pub diagnostics: ImportDiagnostics,
}
