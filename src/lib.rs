//! Monthly reward computation for competitive team games.
//!
//! [`service::RewardEngine`] evaluates eight independent award rules over a
//! closed calendar month of game history and persists one reward row per
//! qualifying award.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod repo;
pub mod service;
pub mod telemetry;

pub use error::RewardError;
pub use models::Period;
pub use service::{RewardEngine, RunReport};
