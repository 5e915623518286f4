//! # lq_app
//!
//! Configuration, logging and command line plumbing for the `liqi` binary

pub mod cli;
pub mod commands;
pub mod config_loader;
pub mod tracing_setup;
