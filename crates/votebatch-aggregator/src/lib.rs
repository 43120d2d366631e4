//! votebatch aggregator
//!
//! Collects individual votes into fixed-capacity batches and drives each
//! sealed batch through witness building and proving to a submittable
//! [`Submission`]. Distinct batches are proved in parallel; a single batch
//! is only ever advanced by the worker that owns it.

pub mod batch;
pub mod collector;
pub mod pipeline;

pub use batch::Batch;
pub use collector::Collector;
pub use pipeline::{BatchProver, Pipeline, Submission};
pub use votebatch_runtime::BatchState;
