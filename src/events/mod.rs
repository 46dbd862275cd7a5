//! Event-sourced process lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ProcessEvent ──append──→ EventStore ──fold──→ ProcessStateData
//! ```
//!
//! - `types.rs` - Events, event kinds and the derived state enum
//! - `reducer.rs` - Pure transition function and `fold`
//! - `state.rs` - Folded per-process state and its validation
//! - `store.rs` - Append-only log with ordering checks and persistence

mod reducer;
mod state;
mod store;
mod types;

pub use reducer::{fold, ProcessStateReducer, Reducer};
pub use state::{OrderingError, ProcessStateData};
pub use store::{EventLogError, EventStore};
pub use types::{Payload, ProcessEvent, ProcessEventKind, ProcessState};
