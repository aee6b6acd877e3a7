//! Engine configuration.
//!
//! Defaults suit interactive use. `from_env` reads overrides from the process
//! environment (load `.env` first with `dotenv` if needed):
//!
//! - `WORKGRAPH_MAX_STEPS`: loop-guard ceiling per run (default 1000).
//! - `WORKGRAPH_TIE_BREAK`: `first` or `last` (default `first`).
//! - `WORKGRAPH_EVENT_BUFFER`: per-subscriber event queue capacity (default 256).
//!
//! Unparseable values are logged and ignored.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::{TieBreak, DEFAULT_MAX_STEPS};
use crate::stream::DEFAULT_EVENT_BUFFER;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_steps: usize,
    pub tie_break: TieBreak,
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            tie_break: TieBreak::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "WORKGRAPH_MAX_STEPS") {
            config.max_steps = v;
        }
        if let Some(v) = parse_var(&lookup, "WORKGRAPH_TIE_BREAK") {
            config.tie_break = v;
        }
        if let Some(v) = parse_var(&lookup, "WORKGRAPH_EVENT_BUFFER") {
            config.event_buffer = v;
        }
        config
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "first_listed" => Ok(TieBreak::FirstListed),
            "last" | "last_listed" => Ok(TieBreak::LastListed),
            other => Err(format!("unknown tie-break policy: {other}")),
        }
    }
}
