//! Run context management.
//!
//! This module provides:
//! - The per-run [`RunContext`] shared by every operator
//! - A thread-safe, last-write-wins [`PropertyBag`]

mod properties;
mod run;

pub use properties::PropertyBag;
pub use run::RunContext;
