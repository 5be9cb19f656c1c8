//! Common functionality for the tally metrics registry.
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod time;

pub use crate::time::*;
