//! CLI subcommand implementations for the ctxlint binary.

pub mod audit_cmd;
pub mod history_cmd;
pub mod output;
pub mod progress;
