//! Reset-and-import tool for per-workspace ConPort knowledge stores.
pub mod cli;
pub mod logging;
pub mod output;
pub mod store;
pub mod workflow;
pub mod workspace;
