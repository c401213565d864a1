//! The eight monthly award rules.
//!
//! Each rule is an independent function of the period over the game history.
//! An empty period is not an error: the rule logs it and writes nothing.

use crate::error::RewardError;
use crate::models::{GameFormat, Period, RewardCategory, RewardId, RewardValue};
use crate::repo::{Extreme, Repo};
use crate::service::reward_writer::RewardWriter;
use crate::service::streak_analyzer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Minimum number of matches in the period to be ranked by win-rate.
pub const WINRATE_FLOOR: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardRule {
    TopRating,
    WorstRating,
    TopWinrate,
    BottomWinrate,
    TopGainedRating,
    TopLostRating,
    MaxGamesPlayed,
    LongestWinStreak,
}

impl AwardRule {
    pub const ALL: [AwardRule; 8] = [
        AwardRule::TopRating,
        AwardRule::WorstRating,
        AwardRule::TopWinrate,
        AwardRule::BottomWinrate,
        AwardRule::TopGainedRating,
        AwardRule::TopLostRating,
        AwardRule::MaxGamesPlayed,
        AwardRule::LongestWinStreak,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AwardRule::TopRating => "top_rating",
            AwardRule::WorstRating => "worst_rating",
            AwardRule::TopWinrate => "top_winrate",
            AwardRule::BottomWinrate => "bottom_winrate",
            AwardRule::TopGainedRating => "top_gained_rating",
            AwardRule::TopLostRating => "top_lost_rating",
            AwardRule::MaxGamesPlayed => "max_games_played",
            AwardRule::LongestWinStreak => "longest_win_streak",
        }
    }

    /// Run the rule for `period`, returning the ids of the rewards it wrote.
    pub async fn evaluate(
        &self,
        repo: &Arc<dyn Repo>,
        writer: &RewardWriter,
        period: Period,
    ) -> Result<Vec<RewardId>, RewardError> {
        match self {
            AwardRule::TopRating => {
                rating_per_format(repo, writer, period, Extreme::Highest, RewardCategory::TopRating)
                    .await
            }
            AwardRule::WorstRating => {
                rating_per_format(repo, writer, period, Extreme::Lowest, RewardCategory::WorstRating)
                    .await
            }
            AwardRule::TopWinrate => {
                winrate(repo, writer, period, Extreme::Highest, RewardCategory::TopWinrate).await
            }
            AwardRule::BottomWinrate => {
                winrate(repo, writer, period, Extreme::Lowest, RewardCategory::BottomWinrate).await
            }
            AwardRule::TopGainedRating => {
                rating_swing(repo, writer, period, Extreme::Highest, RewardCategory::TopGainedRating)
                    .await
            }
            AwardRule::TopLostRating => {
                rating_swing(repo, writer, period, Extreme::Lowest, RewardCategory::TopLostRating)
                    .await
            }
            AwardRule::MaxGamesPlayed => max_games_played(repo, writer, period).await,
            AwardRule::LongestWinStreak => longest_win_streak(repo, writer, period).await,
        }
    }
}

impl std::fmt::Display for AwardRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One single-winner emission per format. A failing format aborts the
/// remaining ones; rewards already written for earlier formats stay.
async fn rating_per_format(
    repo: &Arc<dyn Repo>,
    writer: &RewardWriter,
    period: Period,
    extreme: Extreme,
    category: fn(GameFormat) -> RewardCategory,
) -> Result<Vec<RewardId>, RewardError> {
    let mut written = Vec::new();

    for format in GameFormat::ALL {
        let holder = repo
            .rating_extreme(format, period, extreme)
            .await
            .map_err(|e| {
                RewardError::query(format!("{:?} rating for format {}", extreme, format), e)
            })?;

        let Some(holder) = holder else {
            info!(format = %format, period = %period, "No rated players for format");
            continue;
        };

        let reward_id = writer
            .write(
                holder.user_id,
                period,
                category(format),
                RewardValue::Points(holder.metric),
            )
            .await?;
        written.push(reward_id);
    }

    Ok(written)
}

async fn winrate(
    repo: &Arc<dyn Repo>,
    writer: &RewardWriter,
    period: Period,
    extreme: Extreme,
    category: RewardCategory,
) -> Result<Vec<RewardId>, RewardError> {
    let holder = repo
        .winrate_extreme(period, WINRATE_FLOOR, extreme)
        .await
        .map_err(|e| RewardError::query(format!("{:?} winrate", extreme), e))?;

    let Some(holder) = holder else {
        info!(
            period = %period,
            floor = WINRATE_FLOOR,
            "No player reached the winrate floor"
        );
        return Ok(Vec::new());
    };

    let reward_id = writer
        .write(
            holder.user_id,
            period,
            category,
            RewardValue::Winrate(holder.metric),
        )
        .await?;
    Ok(vec![reward_id])
}

/// Every user tied on the extreme rating sum is rewarded.
async fn rating_swing(
    repo: &Arc<dyn Repo>,
    writer: &RewardWriter,
    period: Period,
    extreme: Extreme,
    category: RewardCategory,
) -> Result<Vec<RewardId>, RewardError> {
    let holders = repo
        .rating_swing_extremes(period, extreme)
        .await
        .map_err(|e| RewardError::query(format!("{:?} rating swing", extreme), e))?;

    if holders.is_empty() {
        info!(period = %period, "No rating changes in period");
        return Ok(Vec::new());
    }

    let mut written = Vec::with_capacity(holders.len());
    for holder in holders {
        let reward_id = writer
            .write(
                holder.user_id,
                period,
                category,
                RewardValue::Points(holder.metric),
            )
            .await?;
        written.push(reward_id);
    }
    Ok(written)
}

async fn max_games_played(
    repo: &Arc<dyn Repo>,
    writer: &RewardWriter,
    period: Period,
) -> Result<Vec<RewardId>, RewardError> {
    let holder = repo
        .most_games_played(period)
        .await
        .map_err(|e| RewardError::query("games played", e))?;

    let Some(holder) = holder else {
        info!(period = %period, "No games played in period");
        return Ok(Vec::new());
    };

    let reward_id = writer
        .write(
            holder.user_id,
            period,
            RewardCategory::MaxGamesPlayed,
            RewardValue::Count(holder.total),
        )
        .await?;
    Ok(vec![reward_id])
}

async fn longest_win_streak(
    repo: &Arc<dyn Repo>,
    writer: &RewardWriter,
    period: Period,
) -> Result<Vec<RewardId>, RewardError> {
    let outcomes = repo
        .match_outcomes(period)
        .await
        .map_err(|e| RewardError::query("match outcomes", e))?;

    let Some(record) = streak_analyzer::longest_win_streak(&outcomes) else {
        info!(
            period = %period,
            outcomes = outcomes.len(),
            "No winning streak found for the period"
        );
        return Ok(Vec::new());
    };

    let reward_id = writer
        .write(
            record.user_id,
            period,
            RewardCategory::LongestWinStreak,
            RewardValue::Count(i64::from(record.longest)),
        )
        .await?;

    info!(
        user_id = record.user_id,
        length = record.longest,
        "Longest win streak saved"
    );
    Ok(vec![reward_id])
}
