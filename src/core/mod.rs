//! Core types shared across the crate.
//!
//! - [`Error`] - crate-wide error taxonomy
//! - [`Result`] - alias over [`Error`]

mod error;

pub use error::{CallbackError, Error, Result};
