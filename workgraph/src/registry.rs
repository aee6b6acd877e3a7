//! Node registry: name → node and name → edge condition.
//!
//! Built mutably at startup, then frozen behind `Arc` and shared by every compiled
//! graph and run. Registration never overwrites: a second registration under the
//! same name is an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::NodeError;
use crate::graph::{Condition, ConditionRef, FnNode, Node, NodeRef};
use crate::state::WorkflowState;

/// Registry lookup / registration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node '{0}' is already registered")]
    DuplicateNode(String),

    #[error("condition '{0}' is already registered")]
    DuplicateCondition(String),

    #[error("node '{0}' not found in registry")]
    UnknownNode(String),
}

/// Registry of named nodes and named edge conditions.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeRef>,
    conditions: HashMap<String, ConditionRef>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` under `name`. Fails with `DuplicateNode` if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        node: Arc<dyn Node>,
    ) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(RegistryError::DuplicateNode(name));
        }
        tracing::debug!(node = %name, "registered node");
        self.nodes.insert(name, node);
        Ok(self)
    }

    /// Registers a plain `state -> state'` transform under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&WorkflowState) -> Result<WorkflowState, NodeError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnNode::new(f)))
    }

    /// Registers an edge condition under `name`, referenced from edges via `when`.
    pub fn register_condition<C>(
        &mut self,
        name: impl Into<String>,
        condition: C,
    ) -> Result<&mut Self, RegistryError>
    where
        C: Condition + 'static,
    {
        let name = name.into();
        if self.conditions.contains_key(&name) {
            return Err(RegistryError::DuplicateCondition(name));
        }
        self.conditions.insert(name, Arc::new(condition));
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Result<NodeRef, RegistryError> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownNode(name.to_string()))
    }

    pub fn condition(&self, name: &str) -> Option<ConditionRef> {
        self.conditions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn contains_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Registered node names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Registered condition names, in no particular order.
    pub fn condition_names(&self) -> Vec<String> {
        self.conditions.keys().cloned().collect()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes = self.names();
        nodes.sort();
        let mut conditions = self.condition_names();
        conditions.sort();
        f.debug_struct("NodeRegistry")
            .field("nodes", &nodes)
            .field("conditions", &conditions)
            .finish()
    }
}
