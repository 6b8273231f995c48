//! fleet director library.
//!
//! The `director` binary runs the background workers; the library exposes
//! the planning, reconciliation and polling core for reuse and integration
//! testing.

pub mod agent;
pub mod config;
pub mod db;
pub mod deployment_plan;
pub mod dns;
pub mod jobs;
