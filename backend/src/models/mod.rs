//! Data models shared across storage, services and API handlers.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

/// Inclusive work-date range for history queries.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRangeQuery {
    /// Returns `(from, to)` with defaults applied; the range is at most one
    /// year long and never inverted.
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or(to - chrono::Duration::days(30));
        let from = from.max(to - chrono::Duration::days(366));
        (from.min(to), to)
    }
}

pub mod activity_period;
pub mod aggregate;
pub mod attendance;
pub mod branch;
pub mod geofence_violation;
pub mod notification;
pub mod overtime_request;
pub mod user;
