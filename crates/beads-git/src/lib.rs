//! Git integration for the beads system.
//!
//! This crate provides git directory discovery and command execution
//! wrappers used by the beads system. It corresponds to the Go
//! `internal/git` package.

pub mod commands;
pub mod gitdir;
pub mod hooks;
