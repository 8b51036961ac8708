#![forbid(unsafe_code)]

//! Walkthroughs of `memora-core` on small owner types.

pub mod cli;
pub mod error;
pub mod logging;
pub mod scenarios;

pub use cli::{run, run_from_env};
