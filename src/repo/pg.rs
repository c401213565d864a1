use super::{Extreme, GameHistoryRepo, RewardRepo, UserCount, UserMetric};
use crate::db::DbPool;
use crate::models::{CategoryId, GameFormat, MatchOutcome, NewReward, Period, RewardId};
use async_trait::async_trait;
use tracing::debug;

/// Postgres-backed store.
///
/// Month membership is a half-open range over the stored timestamps; no time
/// zone conversion happens, so stored times are taken to be in the reporting zone.
#[derive(Clone, Debug)]
pub struct PgRepo {
    pool: DbPool,
}

impl PgRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameHistoryRepo for PgRepo {
    async fn rating_extreme(
        &self,
        format: GameFormat,
        period: Period,
        extreme: Extreme,
    ) -> Result<Option<UserMetric>, sqlx::Error> {
        let query = format!(
            r#"
            WITH last_game AS (
                SELECT
                    tm.user_id,
                    MAX(g.end_time) AS last_game_time
                FROM game.team_members tm
                JOIN game.team t ON tm.team_id = t.id
                JOIN game.game g ON t.game_id = g.id
                WHERE g.type = $1
                  AND g.end_time >= $2
                  AND g.end_time < $3
                GROUP BY tm.user_id
            )
            SELECT
                tm.user_id::BIGINT AS user_id,
                tm.new_rating::FLOAT8 AS metric
            FROM game.team_members tm
            JOIN game.team t ON tm.team_id = t.id
            JOIN game.game g ON t.game_id = g.id
            JOIN last_game lg ON tm.user_id = lg.user_id AND g.end_time = lg.last_game_time
            JOIN account.user u ON tm.user_id = u.id
            WHERE g.type = $1
            ORDER BY metric {}
            LIMIT 1
            "#,
            extreme.sql_order()
        );

        debug!(format = %format, period = %period, ?extreme, "Querying rating extreme");

        sqlx::query_as::<_, UserMetric>(&query)
            .bind(format.db_type())
            .bind(period.start())
            .bind(period.end())
            .fetch_optional(&self.pool)
            .await
    }

    async fn winrate_extreme(
        &self,
        period: Period,
        min_matches: i64,
        extreme: Extreme,
    ) -> Result<Option<UserMetric>, sqlx::Error> {
        let query = format!(
            r#"
            WITH winrates AS (
                SELECT
                    tm.user_id,
                    SUM(CASE WHEN tm.is_winner THEN 1 ELSE 0 END)::FLOAT8
                        / COUNT(t.game_id)::FLOAT8 AS winrate,
                    COUNT(t.game_id) AS total
                FROM game.team t
                JOIN game.team_members tm ON t.id = tm.team_id
                JOIN account.user u ON tm.user_id = u.id
                WHERE t.created_at >= $1
                  AND t.created_at < $2
                GROUP BY tm.user_id
            )
            SELECT
                user_id::BIGINT AS user_id,
                winrate AS metric
            FROM winrates
            WHERE total >= $3
            ORDER BY winrate {}
            LIMIT 1
            "#,
            extreme.sql_order()
        );

        sqlx::query_as::<_, UserMetric>(&query)
            .bind(period.start())
            .bind(period.end())
            .bind(min_matches)
            .fetch_optional(&self.pool)
            .await
    }

    async fn rating_swing_extremes(
        &self,
        period: Period,
        extreme: Extreme,
    ) -> Result<Vec<UserMetric>, sqlx::Error> {
        let query = format!(
            r#"
            WITH user_stats AS (
                SELECT
                    tm.user_id::BIGINT AS user_id,
                    SUM(tm.changed_rating)::FLOAT8 AS metric
                FROM game.team t
                JOIN game.team_members tm ON t.id = tm.team_id
                JOIN account.user u ON tm.user_id = u.id
                WHERE t.created_at >= $1
                  AND t.created_at < $2
                GROUP BY tm.user_id
            )
            SELECT user_id, metric
            FROM user_stats
            WHERE metric = (SELECT {}(metric) FROM user_stats)
            ORDER BY user_id
            "#,
            extreme.sql_aggregate()
        );

        sqlx::query_as::<_, UserMetric>(&query)
            .bind(period.start())
            .bind(period.end())
            .fetch_all(&self.pool)
            .await
    }

    async fn most_games_played(&self, period: Period) -> Result<Option<UserCount>, sqlx::Error> {
        sqlx::query_as::<_, UserCount>(
            r#"
            WITH user_game_stats AS (
                SELECT
                    tm.user_id,
                    COUNT(DISTINCT g.id) AS games_played
                FROM game.team_members tm
                JOIN game.team t ON t.id = tm.team_id
                JOIN game.game g ON g.id = t.game_id
                WHERE g.end_time >= $1
                  AND g.end_time < $2
                GROUP BY tm.user_id
            )
            SELECT
                ugs.user_id::BIGINT AS user_id,
                ugs.games_played AS total
            FROM user_game_stats ugs
            JOIN account.user u ON ugs.user_id = u.id
            ORDER BY ugs.games_played DESC
            LIMIT 1
            "#,
        )
        .bind(period.start())
        .bind(period.end())
        .fetch_optional(&self.pool)
        .await
    }

    async fn match_outcomes(&self, period: Period) -> Result<Vec<MatchOutcome>, sqlx::Error> {
        sqlx::query_as::<_, MatchOutcome>(
            r#"
            SELECT
                tm.user_id::BIGINT AS user_id,
                tm.is_winner,
                g.end_time::TIMESTAMP AS played_at
            FROM game.team_members tm
            JOIN game.team t ON tm.team_id = t.id
            JOIN game.game g ON t.game_id = g.id
            WHERE g.end_time >= $1
              AND g.end_time < $2
            ORDER BY g.end_time ASC
            "#,
        )
        .bind(period.start())
        .bind(period.end())
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl RewardRepo for PgRepo {
    async fn category_id(&self, label: &str) -> Result<Option<CategoryId>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT id::BIGINT FROM statistic.reward_type WHERE type = $1")
            .bind(label)
            .fetch_optional(&self.pool)
            .await
    }

    async fn insert_reward(&self, reward: &NewReward) -> Result<RewardId, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO statistic.reward (user_id, year, month, type, value, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id::BIGINT
            "#,
        )
        .bind(reward.user_id)
        .bind(reward.period.year())
        .bind(reward.period.month() as i32)
        .bind(reward.category_id)
        .bind(&reward.value)
        .fetch_one(&self.pool)
        .await
    }

    async fn upsert_reward(&self, reward: &NewReward) -> Result<RewardId, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id::BIGINT
            FROM statistic.reward
            WHERE user_id = $1 AND year = $2 AND month = $3 AND type = $4
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(reward.user_id)
        .bind(reward.period.year())
        .bind(reward.period.month() as i32)
        .bind(reward.category_id)
        .fetch_optional(&mut *tx)
        .await?;

        let reward_id = match existing {
            Some(id) => {
                sqlx::query("UPDATE statistic.reward SET value = $1 WHERE id = $2")
                    .bind(&reward.value)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO statistic.reward (user_id, year, month, type, value, created_at)
                    VALUES ($1, $2, $3, $4, $5, NOW())
                    RETURNING id::BIGINT
                    "#,
                )
                .bind(reward.user_id)
                .bind(reward.period.year())
                .bind(reward.period.month() as i32)
                .bind(reward.category_id)
                .bind(&reward.value)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(reward_id)
    }
}
