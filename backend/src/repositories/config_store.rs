//! Read-only branch configuration: branches, user assignments, per-weekday
//! shop settings and the per-user geofence flag.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::models::branch::{Branch, ShopConfig};
use crate::types::{BranchId, UserId};
use crate::utils::geo::GeoPoint;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Branches the user is assigned to.
    async fn branches_for_user(&self, user_id: UserId) -> Result<Vec<Branch>, AppError>;

    async fn branch(&self, branch_id: BranchId) -> Result<Option<Branch>, AppError>;

    /// Shop settings for the branch on a weekday, if configured.
    async fn shop_config(
        &self,
        branch_id: BranchId,
        weekday: Weekday,
    ) -> Result<Option<ShopConfig>, AppError>;

    async fn geofence_enabled(&self, user_id: UserId) -> Result<bool, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: BranchId,
    name: String,
    latitude: f64,
    longitude: f64,
    time_zone: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ShopConfigRow {
    open_time: NaiveTime,
    close_time: NaiveTime,
    expected_minutes: i32,
    geofence_radius_m: f64,
    break_allowance_minutes: i32,
    break_warning_minutes: i32,
    ot_timeout_minutes: i32,
    ot_approval_required: bool,
}

impl From<ShopConfigRow> for ShopConfig {
    fn from(row: ShopConfigRow) -> Self {
        ShopConfig {
            open_time: row.open_time,
            close_time: row.close_time,
            expected_minutes: row.expected_minutes,
            geofence_radius_m: row.geofence_radius_m,
            break_allowance_minutes: row.break_allowance_minutes,
            break_warning_minutes: row.break_warning_minutes,
            ot_timeout_minutes: row.ot_timeout_minutes,
            ot_approval_required: row.ot_approval_required,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgConfigStore {
    pool: PgPool,
    /// Zone used for branches without one.
    default_time_zone: Tz,
}

impl PgConfigStore {
    pub fn new(pool: PgPool, default_time_zone: Tz) -> Self {
        Self {
            pool,
            default_time_zone,
        }
    }

    fn to_branch(&self, row: BranchRow) -> Result<Branch, AppError> {
        let time_zone = match row.time_zone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid time zone {} for branch {}: {}", name, row.id, e))?,
            None => self.default_time_zone,
        };
        Ok(Branch {
            id: row.id,
            name: row.name,
            location: GeoPoint::new(row.latitude, row.longitude),
            time_zone,
        })
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn branches_for_user(&self, user_id: UserId) -> Result<Vec<Branch>, AppError> {
        let rows: Vec<BranchRow> = sqlx::query_as(
            "SELECT b.id, b.name, b.latitude, b.longitude, b.time_zone \
             FROM branches b JOIN user_branches ub ON ub.branch_id = b.id \
             WHERE ub.user_id = $1 ORDER BY b.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|row| self.to_branch(row)).collect()
    }

    async fn branch(&self, branch_id: BranchId) -> Result<Option<Branch>, AppError> {
        let row: Option<BranchRow> = sqlx::query_as(
            "SELECT id, name, latitude, longitude, time_zone FROM branches WHERE id = $1",
        )
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| self.to_branch(row)).transpose()
    }

    async fn shop_config(
        &self,
        branch_id: BranchId,
        weekday: Weekday,
    ) -> Result<Option<ShopConfig>, AppError> {
        let row: Option<ShopConfigRow> = sqlx::query_as(
            "SELECT open_time, close_time, expected_minutes, geofence_radius_m, \
             break_allowance_minutes, break_warning_minutes, ot_timeout_minutes, \
             ot_approval_required FROM shop_configs WHERE branch_id = $1 AND weekday = $2",
        )
        .bind(branch_id)
        .bind(weekday.num_days_from_monday() as i16)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ShopConfig::from))
    }

    async fn geofence_enabled(&self, user_id: UserId) -> Result<bool, AppError> {
        let enabled: Option<bool> =
            sqlx::query_scalar("SELECT geofence_enabled FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(enabled.unwrap_or(true))
    }
}

/// Fixed configuration held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    branches: HashMap<BranchId, Branch>,
    assignments: HashMap<UserId, Vec<BranchId>>,
    shop_configs: HashMap<(BranchId, Weekday), ShopConfig>,
    default_configs: HashMap<BranchId, ShopConfig>,
    geofence_disabled: HashSet<UserId>,
}

impl StaticConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branches.insert(branch.id, branch);
        self
    }

    pub fn assign(mut self, user_id: UserId, branch_id: BranchId) -> Self {
        self.assignments.entry(user_id).or_default().push(branch_id);
        self
    }

    /// Settings used for every weekday without a specific entry.
    pub fn with_config(mut self, branch_id: BranchId, config: ShopConfig) -> Self {
        self.default_configs.insert(branch_id, config);
        self
    }

    pub fn with_weekday_config(
        mut self,
        branch_id: BranchId,
        weekday: Weekday,
        config: ShopConfig,
    ) -> Self {
        self.shop_configs.insert((branch_id, weekday), config);
        self
    }

    pub fn without_geofence(mut self, user_id: UserId) -> Self {
        self.geofence_disabled.insert(user_id);
        self
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn branches_for_user(&self, user_id: UserId) -> Result<Vec<Branch>, AppError> {
        let mut branches: Vec<Branch> = self
            .assignments
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.branches.get(id).cloned())
            .collect();
        branches.sort_by_key(|b| b.id);
        Ok(branches)
    }

    async fn branch(&self, branch_id: BranchId) -> Result<Option<Branch>, AppError> {
        Ok(self.branches.get(&branch_id).cloned())
    }

    async fn shop_config(
        &self,
        branch_id: BranchId,
        weekday: Weekday,
    ) -> Result<Option<ShopConfig>, AppError> {
        Ok(self
            .shop_configs
            .get(&(branch_id, weekday))
            .or_else(|| self.default_configs.get(&branch_id))
            .cloned())
    }

    async fn geofence_enabled(&self, user_id: UserId) -> Result<bool, AppError> {
        Ok(!self.geofence_disabled.contains(&user_id))
    }
}
