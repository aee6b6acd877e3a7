//! Graph validation error.
//!
//! Returned by `GraphDefinition::compile` / `validate` when the definition is
//! inconsistent with itself or with the registry. Collects every issue instead of
//! stopping at the first one.

use std::fmt;

use thiserror::Error;

/// One problem found in a graph definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// The same name appears more than once in `nodes`.
    DuplicateNode(String),
    /// `entry_point` is not listed in `nodes`.
    EntryPointMissing(String),
    /// An edge source is not listed in `nodes`.
    UnknownEdgeSource(String),
    /// An edge target is not listed in `nodes`.
    UnknownEdgeTarget { from: String, to: String },
    /// A listed node has no function in the registry.
    UnregisteredNode(String),
    /// An edge's `when` names a condition missing from the registry.
    UnknownCondition {
        from: String,
        to: String,
        condition: String,
    },
}

impl ValidationIssue {
    /// The node this issue is about (the edge source for edge issues).
    pub fn node(&self) -> &str {
        match self {
            ValidationIssue::DuplicateNode(n)
            | ValidationIssue::EntryPointMissing(n)
            | ValidationIssue::UnknownEdgeSource(n)
            | ValidationIssue::UnregisteredNode(n) => n,
            ValidationIssue::UnknownEdgeTarget { to, .. } => to,
            ValidationIssue::UnknownCondition { from, .. } => from,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateNode(n) => write!(f, "node '{}' is listed more than once", n),
            ValidationIssue::EntryPointMissing(n) => {
                write!(f, "entry point '{}' not in nodes list", n)
            }
            ValidationIssue::UnknownEdgeSource(n) => {
                write!(f, "edge source '{}' not in nodes list", n)
            }
            ValidationIssue::UnknownEdgeTarget { from, to } => {
                write!(f, "edge target '{}' (from '{}') not in nodes list", to, from)
            }
            ValidationIssue::UnregisteredNode(n) => {
                write!(f, "node '{}' not found in registry", n)
            }
            ValidationIssue::UnknownCondition {
                from,
                to,
                condition,
            } => write!(
                f,
                "condition '{}' on edge {} -> {} not found in registry",
                condition, from, to
            ),
        }
    }
}

/// Error when a graph definition fails validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid graph: {}", join_issues(.issues))]
pub struct GraphValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl GraphValidationError {
    /// Distinct node names involved in any issue, in first-seen order.
    pub fn offending_nodes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for issue in &self.issues {
            let n = issue.node();
            if !out.iter().any(|seen| seen == n) {
                out.push(n.to_string());
            }
        }
        out
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
