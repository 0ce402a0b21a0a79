//! ctxlint: audit how ready a website is for LLM consumption.
//!
//! A run fetches the seed page, discovers a sample of the site, scores every
//! page for content density and structured data, scores the site for AI bot
//! access and an `llms.txt` file, and combines everything into one report.

pub mod acquisition;
pub mod audit;
pub mod cartography;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod pool;
pub mod scoring;

pub use audit::orchestrator::{run_audit, Auditor};
pub use audit::report::AuditReport;
pub use config::AuditConfig;
pub use error::AuditError;
