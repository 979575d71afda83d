//! # deployer
//!
//! Watches a single git repository and re-runs a deploy command against a
//! fresh checkout whenever the tracked commits or tags change.
//!
//! - [`git::TrackedRepository`] owns the checkout and produces
//!   [`git::RepositorySnapshot`]s.
//! - [`exec::ProcessRunner`] runs the command with a bounded output drain.
//! - [`core::watcher::WatchContext`] compares snapshots across polls and
//!   deploys on change; [`core::manager::supervisor_loop`] drives it forever.

pub mod cli;
pub mod config;
pub mod core;
pub mod exec;
pub mod git;
pub mod log;
