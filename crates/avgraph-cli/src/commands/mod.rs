//! CLI command implementations.

pub mod check;
pub mod common;
pub mod filters;
pub mod formats;
pub mod run;
