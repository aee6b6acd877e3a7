//! Graph definition: node names, ordered candidate edges, entry point.
//!
//! Plain data (deserializable from the HTTP layer). `compile` validates it against a
//! registry once and produces an immutable [`CompiledGraph`]; nothing is re-validated
//! per run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::NodeRegistry;

use super::compiled::CompiledGraph;
use super::validation_error::{GraphValidationError, ValidationIssue};

/// Candidate transition to `to`, optionally guarded by a named condition.
///
/// On the wire an edge is either a bare node name (`"b"`) or `{"to": "b", "when": "cond"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EdgeRepr")]
pub struct Edge {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl Edge {
    /// Unconditional edge.
    pub fn to(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            when: None,
        }
    }

    /// Edge taken only while the registered condition `condition` holds.
    pub fn when(to: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            when: Some(condition.into()),
        }
    }
}

impl From<&str> for Edge {
    fn from(to: &str) -> Self {
        Edge::to(to)
    }
}

impl From<String> for Edge {
    fn from(to: String) -> Self {
        Edge::to(to)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EdgeRepr {
    Plain(String),
    Guarded {
        to: String,
        #[serde(default)]
        when: Option<String>,
    },
}

impl From<EdgeRepr> for Edge {
    fn from(repr: EdgeRepr) -> Self {
        match repr {
            EdgeRepr::Plain(to) => Edge::to(to),
            EdgeRepr::Guarded { to, when } => Edge { to, when },
        }
    }
}

/// Static description of a workflow graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Unique node names.
    pub nodes: Vec<String>,
    /// Ordered successor candidates per node. A node without an entry is terminal.
    #[serde(default)]
    pub edges: HashMap<String, Vec<Edge>>,
    pub entry_point: String,
}

impl GraphDefinition {
    /// Creates a definition with the given entry point and no nodes or edges.
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: HashMap::new(),
            entry_point: entry_point.into(),
        }
    }

    /// Adds a node name. Returns `&mut Self` for chaining.
    pub fn add_node(&mut self, name: impl Into<String>) -> &mut Self {
        self.nodes.push(name.into());
        self
    }

    /// Appends a candidate edge `from -> edge.to`; order of calls is candidate order.
    pub fn add_edge(&mut self, from: impl Into<String>, edge: impl Into<Edge>) -> &mut Self {
        self.edges.entry(from.into()).or_default().push(edge.into());
        self
    }

    /// Candidate successors of `node`; empty for terminal nodes.
    pub fn candidates(&self, node: &str) -> &[Edge] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Validates against `registry` and builds an executable graph.
    pub fn compile(self, registry: Arc<NodeRegistry>) -> Result<CompiledGraph, GraphValidationError> {
        validate(&self, &registry)?;
        Ok(CompiledGraph::new(Arc::new(self), registry))
    }
}

/// Checks every structural and registry invariant, reporting all violations at once.
pub fn validate(def: &GraphDefinition, registry: &NodeRegistry) -> Result<(), GraphValidationError> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for name in &def.nodes {
        if !seen.insert(name.as_str()) {
            issues.push(ValidationIssue::DuplicateNode(name.clone()));
        }
    }

    if !seen.contains(def.entry_point.as_str()) {
        issues.push(ValidationIssue::EntryPointMissing(def.entry_point.clone()));
    }

    let mut sources: Vec<&String> = def.edges.keys().collect();
    sources.sort();
    for from in sources {
        if !seen.contains(from.as_str()) {
            issues.push(ValidationIssue::UnknownEdgeSource(from.clone()));
        }
        for edge in &def.edges[from] {
            if !seen.contains(edge.to.as_str()) {
                issues.push(ValidationIssue::UnknownEdgeTarget {
                    from: from.clone(),
                    to: edge.to.clone(),
                });
            }
            if let Some(condition) = &edge.when {
                if !registry.contains_condition(condition) {
                    issues.push(ValidationIssue::UnknownCondition {
                        from: from.clone(),
                        to: edge.to.clone(),
                        condition: condition.clone(),
                    });
                }
            }
        }
    }

    for name in &def.nodes {
        if !registry.contains(name) {
            issues.push(ValidationIssue::UnregisteredNode(name.clone()));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(GraphValidationError { issues })
    }
}
