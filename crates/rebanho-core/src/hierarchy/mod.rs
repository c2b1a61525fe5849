//! The Area → Setor → PequenoGrupo tree.
//!
//! - `aggregator`: goals and achieved counts per node
//! - `permissions`: the pure permission predicate
//! - `lifecycle`: group creation, split, close, and roster changes

pub mod aggregator;
pub mod lifecycle;
pub mod permissions;

pub use aggregator::{
    count_achieved, sector_group_members, AreaDashboard, HierarchyAggregator, NodeProgress,
    SectorProgress,
};
pub use lifecycle::{
    add_participant, change_leaders, close_group, create_group, remove_participant, split_group,
    update_indicators, Indicators, SplitOutcome, SplitPlan,
};
pub use permissions::{Action, Actor, Leadership};
