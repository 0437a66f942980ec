//! Command line, configuration and dispatch

pub mod args;
pub mod options;
pub mod run;
pub mod state;
