//! Reusable operators for testing and benchmarking pipelines.
//!
//! Every operator counts its calls and can be shared with the pipeline
//! through an `Arc`, so a test keeps a handle to inspect it after the run.

mod mocks;

pub use mocks::{CollectingSink, FailingSink, FlakyTransform, PassthroughTransform, VecSource};
