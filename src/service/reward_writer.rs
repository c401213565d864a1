use crate::error::RewardError;
use crate::models::{NewReward, Period, RewardCategory, RewardId, RewardValue, UserId};
use crate::repo::Repo;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// How repeated runs over the same period are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Always insert; rerunning a period duplicates its rewards.
    Append,
    /// One row per `(user_id, year, month, category_id)`; reruns overwrite the value.
    Upsert,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy::Upsert
    }
}

impl std::fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WritePolicy::Append => write!(f, "append"),
            WritePolicy::Upsert => write!(f, "upsert"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(WritePolicy::Append),
            "upsert" => Ok(WritePolicy::Upsert),
            other => Err(format!("unknown write policy: {}", other)),
        }
    }
}

/// Resolves category labels and persists reward rows.
#[derive(Clone)]
pub struct RewardWriter {
    repo: Arc<dyn Repo>,
    policy: WritePolicy,
}

impl RewardWriter {
    pub fn new(repo: Arc<dyn Repo>, policy: WritePolicy) -> Self {
        Self { repo, policy }
    }

    pub async fn write(
        &self,
        user_id: UserId,
        period: Period,
        category: RewardCategory,
        value: RewardValue,
    ) -> Result<RewardId, RewardError> {
        let label = category.label();

        let category_id = self
            .repo
            .category_id(&label)
            .await
            .map_err(|e| RewardError::query(format!("reward category lookup {:?}", label), e))?
            .ok_or_else(|| RewardError::CategoryNotFound(label.clone()))?;

        let reward = NewReward {
            user_id,
            period,
            category_id,
            value: value.to_value_string(),
        };

        debug!(
            user_id = user_id,
            category = %label,
            category_id = category_id,
            policy = %self.policy,
            "Persisting reward"
        );

        let reward_id = match self.policy {
            WritePolicy::Append => self.repo.insert_reward(&reward).await,
            WritePolicy::Upsert => self.repo.upsert_reward(&reward).await,
        }
        .map_err(|e| RewardError::write(format!("save reward {:?}", label), e))?;

        info!(
            year = period.year(),
            month = period.month(),
            user_id = user_id,
            category = %label,
            value = %reward.value,
            reward_id = reward_id,
            "Reward saved"
        );

        Ok(reward_id)
    }
}
