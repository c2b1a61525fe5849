//! Relational storage for rebanho.
//!
//! `Store` wraps a SQLite connection and implements the repository traits
//! the aggregation and scoring code is written against. Multi-row mutations
//! run inside `Store::in_transaction`.
//!
//! `Snapshot` is the JSON import/export format used to seed or back up a
//! database.

pub mod repository;
pub mod snapshot;
pub mod sqlite;

pub use repository::{
    pick_active_package, EventLog, GoalPackageRepository, HierarchyRepository,
    MembershipRepository, ScoreSink,
};
pub use snapshot::{ImportSummary, Snapshot, SnapshotData};
pub use sqlite::Store;
