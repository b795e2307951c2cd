//! Shared test utilities for the datum workspace.
//!
//! This crate provides fixtures used by several crate test suites. It is a
//! dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: upstream git repositories with committed data files
//! - [`project`]: [`TestProject`] builder for a working directory holding a
//!   config file, a lock file and local source files

pub mod git;
pub mod project;

pub use git::UpstreamRepo;
pub use project::TestProject;
