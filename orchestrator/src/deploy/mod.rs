//! External command execution

pub mod command;
pub mod executor;
pub mod prereq;
