//! Routing hint returned by a node alongside its new state.

/// What the node asks the executor to do next.
///
/// - `Continue`: no hint; the executor evaluates the node's candidate edges.
/// - `Node(id)`: prefer this successor. It must be one of the declared candidates,
///   otherwise the run fails with `InvalidTransition`.
/// - `End`: stop after this node even if edges are declared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Next {
    #[default]
    Continue,
    Node(String),
    End,
}

impl Next {
    /// Hint to jump to `id`.
    pub fn node(id: impl Into<String>) -> Self {
        Next::Node(id.into())
    }
}
