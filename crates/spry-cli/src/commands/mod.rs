//! Command implementations.
//!
//! - [`dev`] - Dev server with rebuild and live reload
//! - [`build`] - One-shot build of every task
//! - [`clean`] - Remove the clean directory
//! - [`check`] - Configuration validation and task plan
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod build;
pub mod check;
pub mod clean;
pub mod dev;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
pub use clean::execute as clean_execute;
pub use dev::execute as dev_execute;
