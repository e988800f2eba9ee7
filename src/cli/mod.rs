//! CLI module for loopwarden - command-line interface and the demo controller.

pub mod commands;
pub mod heartbeat;
pub mod printer;

pub use commands::Cli;
pub use heartbeat::HeartbeatController;
