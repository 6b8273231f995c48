//! Message bus authorization sync.
//!
//! Mirrors the director's agents into the bus authorization file so every
//! agent may only publish and subscribe on its own subjects.

pub mod auth;
pub mod auth_config;
pub mod config;
pub mod error;
pub mod runner;
pub mod users_sync;

pub use auth_config::{NatsAuthConfig, NatsAuthDocument};
pub use error::SyncError;
pub use runner::Runner;
pub use users_sync::UsersSync;
