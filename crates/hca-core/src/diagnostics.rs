//! Non-fatal diagnostics collected during topology and sweep operations.
//!
//! Nothing in the hosting-capacity core is designed to abort an analysis
//! mid-sweep: duplicate grounding reactors, unrecognized node indices and
//! empty produced-element sets are all reported here and the operation
//! continues. Callers inspect the collected issues after the fact.
//!
//! # Example
//!
//! ```
//! use hca_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_info("topology", "Reactor at bus 675 already in the network");
//! diag.add_warning_with_entity("measurement", "Node 7 not in the addressing table", "bus 632");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert!(!diag.has_warnings() || diag.has_issues());
//! ```

use serde::Serialize;

/// Severity of a diagnostic issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected no-op or empty result (e.g. reactor already present)
    Info,
    /// Unusual but the operation continued (e.g. skipped node index)
    Warning,
}

/// A single issue recorded during an operation.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category for grouping ("topology", "measurement", "sweep")
    pub category: String,
    pub message: String,
    /// Optional entity reference (e.g. "bus 632", "load 675a")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Collection of diagnostics for a session or a single operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: Diagnostic) {
        self.issues.push(issue);
    }

    pub fn add_info(&mut self, category: &str, message: &str) {
        self.issues
            .push(Diagnostic::new(Severity::Info, category, message));
    }

    pub fn add_info_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(Diagnostic::new(Severity::Info, category, message).with_entity(entity));
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(Diagnostic::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(Diagnostic::new(Severity::Warning, category, message).with_entity(entity));
    }

    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Info)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    /// Get issues filtered by category.
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a Diagnostic> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// Merge another diagnostics into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }

    pub fn summary(&self) -> String {
        let infos = self.info_count();
        let warnings = self.warning_count();
        match (infos, warnings) {
            (0, 0) => "No issues".to_string(),
            (i, 0) => format!("{} informational", i),
            (0, w) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (i, w) => format!(
                "{} informational, {} warning{}",
                i,
                w,
                if w == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = Diagnostics::new();
        diag.add_info("topology", "reactor already present");
        diag.add_warning("measurement", "node 9 skipped");
        diag.add_warning_with_entity("measurement", "node 9 skipped", "bus 675");

        assert_eq!(diag.info_count(), 1);
        assert_eq!(diag.warning_count(), 2);
        assert!(diag.has_issues());
        assert!(diag.has_warnings());
    }

    #[test]
    fn test_issues_by_category() {
        let mut diag = Diagnostics::new();
        diag.add_info("topology", "no reactors added");
        diag.add_warning("sweep", "abandoned candidate");
        diag.add_info("topology", "pv system already present");

        assert_eq!(diag.issues_by_category("topology").count(), 2);
        assert_eq!(diag.issues_by_category("sweep").count(), 1);
    }

    #[test]
    fn test_diagnostic_display() {
        let issue = Diagnostic::new(Severity::Warning, "measurement", "Node 7 unknown")
            .with_entity("bus 632");
        let display = format!("{}", issue);
        assert!(display.contains("warning"));
        assert!(display.contains("measurement"));
        assert!(display.contains("bus 632"));
    }

    #[test]
    fn test_summary_and_merge() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");
        diag.add_warning("sweep", "one");

        let mut other = Diagnostics::new();
        other.add_info("topology", "two");
        diag.merge(other);

        assert_eq!(diag.summary(), "1 informational, 1 warning");
    }

    #[test]
    fn test_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_warning_with_entity("measurement", "node skipped", "bus 632");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"warning\""));
        assert!(json.contains("bus 632"));
    }
}
