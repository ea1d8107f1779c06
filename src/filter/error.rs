//! Filter errors and diagnostics
//!
//! Every failure the query engine can produce, plus the diagnostic shape the
//! host runtime consumes. User-input errors carry the attribute they belong
//! to (`filter[1].values[0]`, `order_by`) so they can be reported in place.

use super::registry::FieldType;
use crate::linode::{status_hint, ApiError};
use serde::Serialize;

/// Query engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("\"{kind}\" is not a known data source kind")]
    UnknownKind { kind: String },

    #[error("\"{field}\" is not a filterable field. Valid filters: {valid}")]
    UnknownField {
        field: String,
        attribute: String,
        valid: String,
    },

    #[error("{value:?} is not a valid {expected} value for \"{field}\"")]
    TypeMismatch {
        field: String,
        value: String,
        expected: FieldType,
        attribute: String,
    },

    #[error("\"{comparator}\" is not supported on \"{field}\": {reason}")]
    OperatorNotSupported {
        field: String,
        comparator: String,
        reason: String,
        attribute: String,
    },

    #[error("\"{field}\" is an unsupported order_by field. Valid fields: {valid}")]
    OrderNotSupported { field: String, valid: String },

    #[error("invalid order {value:?}, expected \"asc\" or \"desc\"")]
    InvalidOrder { value: String },

    #[error("filter on \"{field}\" has no values")]
    EmptyValues { field: String, attribute: String },

    #[error("upstream request failed{status_text}: {message} (filter: {filter_text})",
        status_text = status_suffix(.status),
        filter_text = .filter.as_deref().unwrap_or("none"))]
    Upstream {
        status: Option<u16>,
        message: String,
        filter: Option<String>,
    },

    #[error("read cancelled before completion")]
    Cancelled,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

impl FilterError {
    /// Wrap an upstream client failure, keeping the server predicate that was sent
    pub fn upstream(error: &ApiError, filter: Option<&str>) -> Self {
        FilterError::Upstream {
            status: error.status(),
            message: error.excerpt(),
            filter: filter.map(str::to_string),
        }
    }

    /// Attribute path the error is attached to, when there is one
    pub fn attribute(&self) -> Option<&str> {
        match self {
            FilterError::UnknownField { attribute, .. }
            | FilterError::TypeMismatch { attribute, .. }
            | FilterError::OperatorNotSupported { attribute, .. }
            | FilterError::EmptyValues { attribute, .. } => Some(attribute),
            FilterError::OrderNotSupported { .. } => Some("order_by"),
            FilterError::InvalidOrder { .. } => Some("order"),
            FilterError::UnknownKind { .. }
            | FilterError::Upstream { .. }
            | FilterError::Cancelled => None,
        }
    }

    /// Short, user-facing summary line
    pub fn summary(&self) -> &'static str {
        match self {
            FilterError::UnknownKind { .. } => "Unknown data source kind.",
            FilterError::UnknownField { .. } => "Attempted to filter on non-filterable field.",
            FilterError::TypeMismatch { .. } => "Invalid filter value.",
            FilterError::OperatorNotSupported { .. } => "Unsupported filter comparison.",
            FilterError::OrderNotSupported { .. } => "Unsupported order_by field.",
            FilterError::InvalidOrder { .. } => "Invalid order.",
            FilterError::EmptyValues { .. } => "Filter has no values.",
            FilterError::Upstream { .. } => "Failed to list resources.",
            FilterError::Cancelled => "Read cancelled.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic as delivered to the host runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn at(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl From<&FilterError> for Diagnostic {
    fn from(error: &FilterError) -> Self {
        let detail = match error {
            FilterError::Upstream { status, .. } => match status_hint(*status) {
                Some(hint) => format!("{} {}", hint, error),
                None => error.to_string(),
            },
            _ => error.to_string(),
        };
        let diagnostic = Diagnostic::error(error.summary(), detail);
        match error.attribute() {
            Some(attribute) => diagnostic.at(attribute),
            None => diagnostic,
        }
    }
}

/// Diagnostics sink for one read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn add_error(&mut self, error: &FilterError) {
        self.push(Diagnostic::from(error));
    }

    pub fn has_error(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_carries_attribute() {
        let err = FilterError::TypeMismatch {
            field: "id".to_string(),
            value: "abc".to_string(),
            expected: FieldType::Int,
            attribute: "filter[0].values[1]".to_string(),
        };

        let diag = Diagnostic::from(&err);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.attribute.as_deref(), Some("filter[0].values[1]"));
        assert_eq!(diag.detail, "\"abc\" is not a valid int value for \"id\"");
    }

    #[test]
    fn test_upstream_message_includes_filter() {
        let err = FilterError::Upstream {
            status: Some(400),
            message: "bad filter".to_string(),
            filter: Some(r#"{"label":"foo"}"#.to_string()),
        };

        assert_eq!(
            err.to_string(),
            r#"upstream request failed with status 400: bad filter (filter: {"label":"foo"})"#
        );
        assert_eq!(err.attribute(), None);
    }

    #[test]
    fn test_upstream_diagnostic_leads_with_status_hint() {
        let err = FilterError::Upstream {
            status: Some(401),
            message: "Invalid Token".to_string(),
            filter: None,
        };

        let diag = Diagnostic::from(&err);
        assert_eq!(diag.summary, "Failed to list resources.");
        assert_eq!(
            diag.detail,
            "Authentication failed. Check LINODE_TOKEN. upstream request failed with status 401: Invalid Token (filter: none)"
        );

        let err = FilterError::Upstream {
            status: None,
            message: "connection refused".to_string(),
            filter: None,
        };
        assert_eq!(Diagnostic::from(&err).detail, err.to_string());
    }

    #[test]
    fn test_order_errors_attach_to_order_attributes() {
        let err = FilterError::OrderNotSupported {
            field: "status".to_string(),
            valid: "id, label".to_string(),
        };
        assert_eq!(err.attribute(), Some("order_by"));

        let err = FilterError::InvalidOrder {
            value: "up".to_string(),
        };
        assert_eq!(err.attribute(), Some("order"));
    }

    #[test]
    fn test_diagnostics_sink() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_error());

        diags.push(Diagnostic::warning("Heads up.", "nothing serious"));
        assert!(!diags.has_error());

        diags.add_error(&FilterError::Cancelled);
        assert!(diags.has_error());
        assert_eq!(diags.len(), 2);
    }
}
