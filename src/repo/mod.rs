//! Data-store seams of the engine.
//!
//! Game history is read-only: it is owned by the gameplay system. The only
//! writes the engine performs go through [`RewardRepo`].

#[cfg(test)]
mod memory;
mod pg;

#[cfg(test)]
pub use memory::{FaultMode, MemoryRepo, QueryKind};
pub use pg::PgRepo;

use crate::models::{CategoryId, GameFormat, MatchOutcome, NewReward, Period, RewardId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which end of an ordering a rule is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Extreme {
    Highest,
    Lowest,
}

impl Extreme {
    pub fn sql_order(&self) -> &'static str {
        match self {
            Extreme::Highest => "DESC",
            Extreme::Lowest => "ASC",
        }
    }

    pub fn sql_aggregate(&self) -> &'static str {
        match self {
            Extreme::Highest => "MAX",
            Extreme::Lowest => "MIN",
        }
    }

    /// True when `candidate` strictly beats `current`.
    pub fn beats(&self, candidate: f64, current: f64) -> bool {
        match self {
            Extreme::Highest => candidate > current,
            Extreme::Lowest => candidate < current,
        }
    }
}

/// A user together with a floating point aggregate (rating, win-rate, delta sum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserMetric {
    pub user_id: UserId,
    pub metric: f64,
}

/// A user together with a count aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserCount {
    pub user_id: UserId,
    pub total: i64,
}

#[async_trait]
pub trait GameHistoryRepo: Send + Sync {
    /// The user whose last rating of the period in `format` is the highest
    /// (resp. lowest). Ties resolve in store order.
    async fn rating_extreme(
        &self,
        format: GameFormat,
        period: Period,
        extreme: Extreme,
    ) -> Result<Option<UserMetric>, sqlx::Error>;

    /// The user with the highest (resp. lowest) win-rate among users with at
    /// least `min_matches` matches in the period.
    async fn winrate_extreme(
        &self,
        period: Period,
        min_matches: i64,
        extreme: Extreme,
    ) -> Result<Option<UserMetric>, sqlx::Error>;

    /// Every user whose summed rating delta equals the period maximum (resp. minimum).
    async fn rating_swing_extremes(
        &self,
        period: Period,
        extreme: Extreme,
    ) -> Result<Vec<UserMetric>, sqlx::Error>;

    /// The user with the most distinct matches in the period.
    async fn most_games_played(&self, period: Period) -> Result<Option<UserCount>, sqlx::Error>;

    /// Every participation outcome of the period, ascending by match completion time.
    async fn match_outcomes(&self, period: Period) -> Result<Vec<MatchOutcome>, sqlx::Error>;
}

#[async_trait]
pub trait RewardRepo: Send + Sync {
    async fn category_id(&self, label: &str) -> Result<Option<CategoryId>, sqlx::Error>;

    async fn insert_reward(&self, reward: &NewReward) -> Result<RewardId, sqlx::Error>;

    /// Update the value of the reward already stored for
    /// `(user_id, period, category_id)`, or insert it when absent.
    async fn upsert_reward(&self, reward: &NewReward) -> Result<RewardId, sqlx::Error>;
}

pub trait Repo: GameHistoryRepo + RewardRepo {}

impl<T: GameHistoryRepo + RewardRepo> Repo for T {}
