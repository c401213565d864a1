use super::game::{GameFormat, UserId};
use super::period::Period;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type RewardId = i64;
pub type CategoryId = i64;

/// Catalog entry of a reward. Categories are seeded outside the engine and
/// only ever looked up by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardCategory {
    TopRating(GameFormat),
    WorstRating(GameFormat),
    TopWinrate,
    BottomWinrate,
    TopGainedRating,
    TopLostRating,
    MaxGamesPlayed,
    LongestWinStreak,
}

impl RewardCategory {
    pub fn all() -> Vec<RewardCategory> {
        let mut categories: Vec<RewardCategory> = GameFormat::ALL
            .into_iter()
            .map(RewardCategory::TopRating)
            .collect();
        categories.extend(GameFormat::ALL.into_iter().map(RewardCategory::WorstRating));
        categories.extend([
            RewardCategory::TopWinrate,
            RewardCategory::BottomWinrate,
            RewardCategory::TopGainedRating,
            RewardCategory::TopLostRating,
            RewardCategory::MaxGamesPlayed,
            RewardCategory::LongestWinStreak,
        ]);
        categories
    }

    /// Label stored in `statistic.reward_type.type` by the gameplay platform.
    pub fn label(&self) -> String {
        match self {
            RewardCategory::TopRating(format) => {
                format!("Лучший игрок месяца по рейтингу {}!", format.db_type())
            }
            RewardCategory::WorstRating(format) => {
                format!("Худший игрок месяца по рейтингу {}!", format.db_type())
            }
            RewardCategory::TopWinrate => "Лучший процент побед за месяц!".to_string(),
            RewardCategory::BottomWinrate => "Худший процент побед за месяц!".to_string(),
            RewardCategory::TopGainedRating => "Максимальный прирост рейтинга за месяц!".to_string(),
            RewardCategory::TopLostRating => "Максимальная потеря рейтинга за месяц!".to_string(),
            RewardCategory::MaxGamesPlayed => {
                "Наибольшее количество сыгранных игр за месяц!".to_string()
            }
            RewardCategory::LongestWinStreak => "Самая длинная серия подряд за месяц!".to_string(),
        }
    }
}

impl std::fmt::Display for RewardCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Typed award value; the store only ever sees its string form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RewardValue {
    /// Rating points, including summed rating deltas.
    Points(f64),
    /// Share of won matches in `[0, 1]`.
    Winrate(f64),
    Count(i64),
}

impl RewardValue {
    pub fn to_value_string(&self) -> String {
        match self {
            RewardValue::Points(points) => format_points(*points),
            RewardValue::Winrate(rate) => format_winrate(*rate),
            RewardValue::Count(count) => count.to_string(),
        }
    }
}

/// Rating points are truncated toward zero: `1532.0` becomes `"1532"`.
pub fn format_points(points: f64) -> String {
    (points.trunc() as i64).to_string()
}

/// Two significant digits, trailing zeros dropped: `0.6667` becomes `"0.67"`.
pub fn format_winrate(rate: f64) -> String {
    if rate == 0.0 || !rate.is_finite() {
        return "0".to_string();
    }
    let exponent = rate.abs().log10().floor() as i32;
    let decimals = (1 - exponent).max(0) as usize;
    let formatted = format!("{:.*}", decimals, rate);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

/// Row to be written into `statistic.reward`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReward {
    pub user_id: UserId,
    pub period: Period,
    pub category_id: CategoryId,
    pub value: String,
}

/// Persisted reward row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reward {
    pub id: RewardId,
    pub user_id: UserId,
    pub year: i32,
    pub month: i32,
    #[sqlx(rename = "type")]
    pub category_id: CategoryId,
    pub value: String,
    pub created_at: NaiveDateTime,
}
