//! Issues collected while checking a save request.

use serde::Serialize;
use std::fmt;

/// Everything found wrong with one save request.
///
/// Errors reject the request before any side effect; warnings are logged
/// and the request proceeds.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn of(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn error_count(&self) -> usize {
        self.of(Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.of(Severity::Warning).count()
    }

    /// No errors; warnings are allowed.
    pub fn is_ok(&self) -> bool {
        self.of(Severity::Error).next().is_none()
    }

    /// True if any issue carries `code`.
    pub fn has(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Request is valid");
        }
        writeln!(
            f,
            "Request has {} error(s) and {} warning(s)",
            self.error_count(),
            self.warning_count()
        )?;
        // Errors first so the reason for a rejection leads the listing.
        for issue in self.of(Severity::Error).chain(self.of(Severity::Warning)) {
            writeln!(f, "  - {issue}")?;
        }
        Ok(())
    }
}

/// One finding, tied to the part of the request it concerns.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, context)
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {:?} in {}: {}", self.code, self.context, self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Stable identifiers for each kind of finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCode {
    MissingDatasetId,
    MissingVersionTag,
    /// Tag is blank or cannot be used as a directory name.
    UnsafeVersionTag,
    /// Entry is skipped.
    MissingImageId,
    /// Entries are applied in request order.
    DuplicateImageId,
    EmptyLabel,
    BBoxNotFinite,
    /// Center outside `[0, 1]` or a negative extent.
    BBoxOutOfRange,
    BBoxZeroArea,
}

/// Where in the request an issue was found. Indices are zero-based.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "at", rename_all = "lowercase")]
pub enum IssueContext {
    Request,
    Image { index: usize },
    Annotation { image: usize, annotation: usize },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IssueContext::Request => f.write_str("request"),
            IssueContext::Image { index } => write!(f, "images[{index}]"),
            IssueContext::Annotation { image, annotation } => {
                write!(f, "images[{image}].annotations[{annotation}]")
            }
        }
    }
}
