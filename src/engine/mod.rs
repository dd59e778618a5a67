//! Execution engine for converge
//!
//! The engine wraps a declarative run with the terminal:
//! 1. Previewing - dry pass and diff display, then confirmation
//! 2. Converging - apply with a progress bar, then refreshes
//! 3. Reporting - final summary

pub mod differ;
pub mod executor;

pub use executor::{ApplyOptions, execute};
