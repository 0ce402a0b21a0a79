//! Audit runs and what happens to their results: the report model, the
//! orchestrator, history and baselines, the CI gate, and webhook payloads.

pub mod baseline;
pub mod gate;
pub mod history;
pub mod orchestrator;
pub mod report;
pub mod webhook;
