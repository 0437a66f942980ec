//! Launchpad Library
//!
//! Deployment lifecycle orchestration for static sites and cluster workloads.

pub mod app;
pub mod artifacts;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod prompt;
pub mod rollback;
pub mod storage;
pub mod targets;
pub mod utils;
