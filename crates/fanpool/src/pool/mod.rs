//! Worker pool lifecycle and the worker tasks it supervises.
//!
//! - `manager` - the [`WorkerPool`] itself.
//! - `worker` - the per-worker loop and its panic supervisor.
//! - `config` - sizing and the builder.
//! - `state` - pool and worker lifecycle states.

mod config;
mod manager;
mod state;
mod worker;

pub use config::*;
pub use manager::*;
pub use state::{PoolState, WorkerState};
