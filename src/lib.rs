//! Source, sink and transform nodes for recorded time series with
//! run-length annotations.
//!
//! A recording is a container file holding a samples x channels matrix plus
//! companion files sharing its base name: a `start,end,act` annotation table
//! and a JSON metadata record with the channel names.

pub mod core;
pub mod error;
pub mod format;
pub mod nodes;

pub use error::{Error, Result};
