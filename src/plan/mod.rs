//! Pure planning: no host calls, no I/O.
//!
//! [`Planner`] turns a batch of [`MoveRequest`]s into an [`OperationSequence`]
//! that is safe to execute against a host which renumbers slides after every
//! move. [`plan_merge`] validates a [`MergeRequest`] against both documents'
//! slide counts.

pub mod planner;
pub mod request;
pub mod sequence;

pub use planner::{plan_merge, Planner};
pub use request::{check_batch, check_batch_shape, parse_positions, Direction, MergeRequest, MoveRequest};
pub use sequence::{Operation, OperationSequence};
