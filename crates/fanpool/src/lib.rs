#![doc = include_str!("../README.md")]

mod barrier;
mod error;
mod fan_in;
mod job;
mod pipeline;
mod pool;
mod queue;
mod transform;

pub use crate::barrier::*;
pub use crate::error::{PoolError, Result, TransformError};
pub use crate::fan_in::*;
pub use crate::job::*;
pub use crate::pipeline::*;
pub use crate::pool::*;
pub use crate::queue::{QueueStream, ResultStream};
pub use crate::transform::*;
