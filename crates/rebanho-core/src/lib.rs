//! Core library for rebanho.
//!
//! This crate holds everything the church administration tools share:
//!
//! - `models`: members, the Area → Setor → PequenoGrupo tree, goal packages,
//!   ELEVE point events and monthly records, journey entries
//! - `store`: the SQLite-backed store and the repository traits the
//!   algorithms are written against
//! - `hierarchy`: goal/progress aggregation, permission rules and the
//!   small-group lifecycle
//! - `eleve`: monthly engagement scoring, sector ranking, attendance,
//!   daily lessons and annual standings
//! - `config`: on-disk configuration

pub mod config;
pub mod eleve;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::Config;
pub use error::{CoreError, Result};
pub use store::Store;
