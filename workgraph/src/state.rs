//! Workflow state: the record that flows between nodes.
//!
//! Every transition yields a fresh `WorkflowState`; nodes borrow the previous value
//! immutably and return a new one, either through struct-update syntax or through
//! [`WorkflowState::derive`] when the changed fields are only known by name at runtime
//! (e.g. caller input arriving as JSON).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error when building or deriving a state from named field updates.
#[derive(Debug, Error)]
pub enum StateError {
    /// The update names a field that `WorkflowState` does not have.
    #[error("invalid state field: {0}")]
    InvalidField(String),

    /// The field exists but the value has the wrong shape (e.g. string for a counter).
    #[error("invalid value for state field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The state could not be converted to or from its JSON record form.
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shared workflow state carried between nodes.
///
/// Field set and defaults follow the summarization pipeline the engine was built
/// for; the engine itself only relies on the copy-on-write contract, never on
/// individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    /// Original input text.
    pub text: String,
    /// Maximum allowed summary length in characters.
    pub max_length: i64,
    /// Target chunk size in characters used when splitting `text`.
    pub chunk_size: i64,
    pub chunks: Vec<String>,
    pub chunk_summaries: Vec<String>,
    pub merged_summary: String,
    pub refined_summary: String,
    /// Length of the latest summary; drives refinement loops.
    pub current_length: i64,
    /// Number of refinement passes executed so far.
    pub refinement_iterations: i64,
    pub max_refinement_iterations: i64,
    /// Free-form metadata collected by nodes.
    pub execution_metadata: Map<String, Value>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            text: String::new(),
            max_length: 100,
            chunk_size: 50,
            chunks: Vec::new(),
            chunk_summaries: Vec::new(),
            merged_summary: String::new(),
            refined_summary: String::new(),
            current_length: 0,
            refinement_iterations: 0,
            max_refinement_iterations: 5,
            execution_metadata: Map::new(),
        }
    }
}

impl WorkflowState {
    /// Builds the initial state of a run: `input` merged over field defaults.
    ///
    /// Unknown keys are rejected with [`StateError::InvalidField`] so that typos in
    /// caller input surface instead of silently running with defaults.
    pub fn from_input(input: Map<String, Value>) -> Result<Self, StateError> {
        Self::default().derive(input)
    }

    /// Returns a new state equal to `self` except for the given fields.
    ///
    /// `self` is never modified. Fails on the first unknown field name, or when a
    /// value does not fit the field's type.
    pub fn derive<I, K>(&self, updates: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut fields = self.to_record()?;
        let mut touched = Vec::new();
        for (key, value) in updates {
            let key = key.into();
            if !fields.contains_key(&key) {
                return Err(StateError::InvalidField(key));
            }
            fields.insert(key.clone(), value);
            touched.push(key);
        }
        serde_json::from_value(Value::Object(fields)).map_err(|e| StateError::InvalidValue {
            field: touched.join(","),
            reason: e.to_string(),
        })
    }

    /// Serializes the state as a JSON object, e.g. for run snapshots on the wire.
    pub fn to_json(&self) -> Value {
        match self.to_record() {
            Ok(fields) => Value::Object(fields),
            Err(_) => Value::Null,
        }
    }

    /// Convenience for nodes that add one metadata key: returns the metadata map
    /// with `key` set, leaving `self` untouched.
    pub fn metadata_with(&self, key: impl Into<String>, value: Value) -> Map<String, Value> {
        let mut metadata = self.execution_metadata.clone();
        metadata.insert(key.into(), value);
        metadata
    }

    fn to_record(&self) -> Result<Map<String, Value>, StateError> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(StateError::InvalidValue {
                field: String::new(),
                reason: format!("state serialized to non-object {}", other),
            }),
        }
    }
}
