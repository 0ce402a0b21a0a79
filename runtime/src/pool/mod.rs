//! Bounded worker pool for page audits.

pub mod manager;
