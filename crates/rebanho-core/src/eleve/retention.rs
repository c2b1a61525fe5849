//! Pruning of past years' monthly records.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub year: i32,
    pub deleted: usize,
}

/// Delete every monthly record of `target_year` (default: the year before
/// `today`). The current and future years are refused.
pub fn prune_monthly_records(
    store: &Store,
    target_year: Option<i32>,
    today: NaiveDate,
) -> Result<PruneReport> {
    let year = target_year.unwrap_or(today.year() - 1);
    if year >= today.year() {
        return Err(CoreError::InvalidInput(format!(
            "refusing to delete monthly records of {}: only past years can be pruned",
            year
        )));
    }
    let deleted = store.delete_monthly_scores(year)?;
    info!(year, deleted, "Pruned monthly records");
    Ok(PruneReport { year, deleted })
}
