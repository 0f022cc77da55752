//! Maestro CLI library: demo agents and command implementations shared by
//! the `maestro` binary and its integration tests.

pub mod agents;
pub mod commands;
