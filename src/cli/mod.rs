//! CLI module for taskgate - command-line interface and subcommands.
//!
//! Provides the demo entry point for running tasks through a queue and
//! inspecting configured queues.

pub mod commands;

pub use commands::Cli;
