//! Live execution events.
//!
//! Runs publish [`ExecutionEvent`]s to an [`EventBroadcaster`]; observers subscribe per
//! graph or per run and receive them through a [`Subscription`] (also a `Stream`).

mod broadcaster;
mod event;

pub use broadcaster::{EventBroadcaster, Subscription, Topic, DEFAULT_EVENT_BUFFER};
pub use event::{EventKind, ExecutionEvent, StateSnapshot};
