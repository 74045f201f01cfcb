//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Name conversion helpers shared by path mapping and default-prim logic

mod error;
mod names;

pub use error::*;
pub use names::*;
