use super::{Extreme, GameHistoryRepo, RewardRepo, UserCount, UserMetric};
use crate::models::{
    CategoryId, GameFormat, MatchOutcome, NewReward, Participation, Period, Reward,
    RewardCategory, RewardId, UserId,
};
use async_trait::async_trait;
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Store operation a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Last-rating query of one format, for one end of the ranking.
    Rating(GameFormat, Extreme),
    Winrate,
    RatingSwing,
    GamesPlayed,
    Outcomes,
    CategoryLookup,
    RewardWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    Error,
    Panic,
}

#[derive(Debug, Default)]
struct Data {
    participations: Vec<Participation>,
    categories: Vec<(CategoryId, String)>,
    rewards: Vec<Reward>,
    faults: HashMap<QueryKind, FaultMode>,
}

/// In-memory store holding stub game history for unit tests. Aggregates follow
/// the same rules as the Postgres queries; ties resolve in insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepo {
    conn: Arc<Mutex<Data>>,
}

impl MemoryRepo {
    /// Empty history with the full category catalog seeded.
    pub fn new() -> Self {
        let this = Self::default();
        {
            let mut data = this.conn.lock().unwrap_or_else(|e| e.into_inner());
            data.categories = RewardCategory::all()
                .into_iter()
                .enumerate()
                .map(|(idx, category)| (idx as CategoryId + 1, category.label()))
                .collect();
        }
        this
    }

    pub fn with_participations(participations: impl IntoIterator<Item = Participation>) -> Self {
        let this = Self::new();
        this.add_participations(participations);
        this
    }

    pub fn add_participations(&self, participations: impl IntoIterator<Item = Participation>) {
        let mut data = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        data.participations.extend(participations);
    }

    pub fn remove_category(&self, label: &str) {
        let mut data = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        data.categories.retain(|(_, l)| l != label);
    }

    pub fn inject_fault(&self, kind: QueryKind, mode: FaultMode) {
        let mut data = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        data.faults.insert(kind, mode);
    }

    pub fn rewards(&self) -> Vec<Reward> {
        let data = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        data.rewards.clone()
    }

    pub fn category_label(&self, category_id: CategoryId) -> Option<String> {
        let data = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        data.categories
            .iter()
            .find(|(id, _)| *id == category_id)
            .map(|(_, label)| label.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Data>, sqlx::Error> {
        self.conn
            .lock()
            .map_err(|_| sqlx::Error::Protocol("memory repo lock poisoned".to_string()))
    }

    // The guard is dropped before an injected panic fires, keeping the lock unpoisoned.
    fn check_fault(&self, kind: QueryKind) -> Result<(), sqlx::Error> {
        let mode = self.lock()?.faults.get(&kind).copied();
        match mode {
            None => Ok(()),
            Some(FaultMode::Error) => Err(sqlx::Error::Protocol(format!(
                "injected failure in {:?}",
                kind
            ))),
            Some(FaultMode::Panic) => panic!("injected panic in {:?}", kind),
        }
    }
}

/// Pick the extreme metric, keeping the earliest user on ties.
fn pick_extreme(metrics: Vec<UserMetric>, extreme: Extreme) -> Option<UserMetric> {
    let mut best: Option<UserMetric> = None;
    for candidate in metrics {
        let replace = best
            .as_ref()
            .map_or(true, |current| extreme.beats(candidate.metric, current.metric));
        if replace {
            best = Some(candidate);
        }
    }
    best
}

/// Per-user accumulation that remembers first-appearance order.
struct Grouped<T> {
    order: Vec<UserId>,
    values: HashMap<UserId, T>,
}

impl<T: Default> Grouped<T> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            values: HashMap::new(),
        }
    }

    fn entry(&mut self, user_id: UserId) -> &mut T {
        if !self.values.contains_key(&user_id) {
            self.order.push(user_id);
        }
        self.values.entry(user_id).or_default()
    }

    fn into_ordered(mut self) -> Vec<(UserId, T)> {
        self.order
            .iter()
            .filter_map(|user_id| self.values.remove(user_id).map(|v| (*user_id, v)))
            .collect()
    }
}

#[async_trait]
impl GameHistoryRepo for MemoryRepo {
    async fn rating_extreme(
        &self,
        format: GameFormat,
        period: Period,
        extreme: Extreme,
    ) -> Result<Option<UserMetric>, sqlx::Error> {
        self.check_fault(QueryKind::Rating(format, extreme))?;
        let data = self.lock()?;

        let mut latest: Grouped<Option<(chrono::NaiveDateTime, f64)>> = Grouped::new();
        for p in data
            .participations
            .iter()
            .filter(|p| p.format == format && period.contains(p.match_ended_at))
        {
            let slot = latest.entry(p.user_id);
            match *slot {
                Some((ended_at, _)) if ended_at >= p.match_ended_at => {}
                _ => *slot = Some((p.match_ended_at, p.rating_after)),
            }
        }

        let metrics = latest
            .into_ordered()
            .into_iter()
            .filter_map(|(user_id, last)| {
                last.map(|(_, rating)| UserMetric {
                    user_id,
                    metric: rating,
                })
            })
            .collect();
        Ok(pick_extreme(metrics, extreme))
    }

    async fn winrate_extreme(
        &self,
        period: Period,
        min_matches: i64,
        extreme: Extreme,
    ) -> Result<Option<UserMetric>, sqlx::Error> {
        self.check_fault(QueryKind::Winrate)?;
        let data = self.lock()?;

        let mut tallies: Grouped<(i64, i64)> = Grouped::new();
        for p in data
            .participations
            .iter()
            .filter(|p| period.contains(p.team_created_at))
        {
            let (wins, total) = tallies.entry(p.user_id);
            if p.is_winner {
                *wins += 1;
            }
            *total += 1;
        }

        let metrics = tallies
            .into_ordered()
            .into_iter()
            .filter(|(_, (_, total))| *total >= min_matches)
            .map(|(user_id, (wins, total))| UserMetric {
                user_id,
                metric: wins as f64 / total as f64,
            })
            .collect();
        Ok(pick_extreme(metrics, extreme))
    }

    async fn rating_swing_extremes(
        &self,
        period: Period,
        extreme: Extreme,
    ) -> Result<Vec<UserMetric>, sqlx::Error> {
        self.check_fault(QueryKind::RatingSwing)?;
        let data = self.lock()?;

        let mut sums: Grouped<f64> = Grouped::new();
        for p in data
            .participations
            .iter()
            .filter(|p| period.contains(p.team_created_at))
        {
            *sums.entry(p.user_id) += p.rating_delta();
        }

        let sums = sums.into_ordered();
        let target = match pick_extreme(
            sums.iter()
                .map(|(user_id, metric)| UserMetric {
                    user_id: *user_id,
                    metric: *metric,
                })
                .collect(),
            extreme,
        ) {
            Some(best) => best.metric,
            None => return Ok(Vec::new()),
        };

        let mut tied: Vec<UserMetric> = sums
            .into_iter()
            .filter(|(_, metric)| *metric == target)
            .map(|(user_id, metric)| UserMetric { user_id, metric })
            .collect();
        tied.sort_by_key(|m| m.user_id);
        Ok(tied)
    }

    async fn most_games_played(&self, period: Period) -> Result<Option<UserCount>, sqlx::Error> {
        self.check_fault(QueryKind::GamesPlayed)?;
        let data = self.lock()?;

        let mut games: Grouped<HashSet<i64>> = Grouped::new();
        for p in data
            .participations
            .iter()
            .filter(|p| period.contains(p.match_ended_at))
        {
            games.entry(p.user_id).insert(p.match_id);
        }

        let mut best: Option<UserCount> = None;
        for (user_id, matches) in games.into_ordered() {
            let total = matches.len() as i64;
            if best.as_ref().map_or(true, |b| total > b.total) {
                best = Some(UserCount { user_id, total });
            }
        }
        Ok(best)
    }

    async fn match_outcomes(&self, period: Period) -> Result<Vec<MatchOutcome>, sqlx::Error> {
        self.check_fault(QueryKind::Outcomes)?;
        let data = self.lock()?;

        let mut outcomes: Vec<MatchOutcome> = data
            .participations
            .iter()
            .filter(|p| period.contains(p.match_ended_at))
            .map(|p| MatchOutcome {
                user_id: p.user_id,
                is_winner: p.is_winner,
                played_at: p.match_ended_at,
            })
            .collect();
        // Stable: equal completion times keep insertion order
        outcomes.sort_by_key(|o| o.played_at);
        Ok(outcomes)
    }
}

#[async_trait]
impl RewardRepo for MemoryRepo {
    async fn category_id(&self, label: &str) -> Result<Option<CategoryId>, sqlx::Error> {
        self.check_fault(QueryKind::CategoryLookup)?;
        let data = self.lock()?;
        Ok(data
            .categories
            .iter()
            .find(|(_, l)| l == label)
            .map(|(id, _)| *id))
    }

    async fn insert_reward(&self, reward: &NewReward) -> Result<RewardId, sqlx::Error> {
        self.check_fault(QueryKind::RewardWrite)?;
        let mut data = self.lock()?;
        let id = data.rewards.len() as RewardId + 1;
        data.rewards.push(Reward {
            id,
            user_id: reward.user_id,
            year: reward.period.year(),
            month: reward.period.month() as i32,
            category_id: reward.category_id,
            value: reward.value.clone(),
            created_at: Local::now().naive_local(),
        });
        Ok(id)
    }

    async fn upsert_reward(&self, reward: &NewReward) -> Result<RewardId, sqlx::Error> {
        self.check_fault(QueryKind::RewardWrite)?;
        {
            let mut data = self.lock()?;
            if let Some(existing) = data.rewards.iter_mut().find(|r| {
                r.user_id == reward.user_id
                    && r.year == reward.period.year()
                    && r.month == reward.period.month() as i32
                    && r.category_id == reward.category_id
            }) {
                existing.value = reward.value.clone();
                return Ok(existing.id);
            }
        }
        self.insert_reward(reward).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn play(
        match_id: i64,
        user_id: UserId,
        format: GameFormat,
        is_winner: bool,
        rating_after: f64,
        ended_at: NaiveDateTime,
    ) -> Participation {
        Participation {
            match_id,
            format,
            user_id,
            is_winner,
            rating_before: rating_after - 10.0,
            rating_after,
            team_created_at: ended_at,
            match_ended_at: ended_at,
        }
    }

    fn march() -> Period {
        Period::new(2025, 3).unwrap()
    }

    #[tokio::test]
    async fn test_rating_extreme_uses_last_rating_in_period() {
        let repo = MemoryRepo::with_participations(vec![
            play(1, 7, GameFormat::TwoVsTwo, true, 1700.0, at(2, 10)),
            play(2, 7, GameFormat::TwoVsTwo, false, 1400.0, at(20, 10)),
            play(3, 8, GameFormat::TwoVsTwo, true, 1500.0, at(5, 10)),
            play(4, 9, GameFormat::OneVsOne, true, 2000.0, at(5, 10)),
        ]);

        let top = repo
            .rating_extreme(GameFormat::TwoVsTwo, march(), Extreme::Highest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(top, UserMetric { user_id: 8, metric: 1500.0 });

        let worst = repo
            .rating_extreme(GameFormat::TwoVsTwo, march(), Extreme::Lowest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(worst, UserMetric { user_id: 7, metric: 1400.0 });

        let none = repo
            .rating_extreme(GameFormat::FiveVsFive, march(), Extreme::Highest)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_most_games_counts_distinct_matches() {
        let repo = MemoryRepo::with_participations(vec![
            play(1, 1, GameFormat::OneVsOne, true, 1010.0, at(1, 10)),
            play(1, 1, GameFormat::OneVsOne, true, 1010.0, at(1, 10)),
            play(2, 2, GameFormat::OneVsOne, true, 1010.0, at(2, 10)),
            play(3, 2, GameFormat::OneVsOne, true, 1020.0, at(3, 10)),
        ]);

        let best = repo.most_games_played(march()).await.unwrap().unwrap();
        assert_eq!(best, UserCount { user_id: 2, total: 2 });
    }

    #[tokio::test]
    async fn test_outcomes_sorted_and_bounded_by_period() {
        let outside = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let repo = MemoryRepo::with_participations(vec![
            play(2, 1, GameFormat::OneVsOne, false, 990.0, at(9, 10)),
            play(1, 1, GameFormat::OneVsOne, true, 1000.0, at(3, 10)),
            play(3, 1, GameFormat::OneVsOne, true, 1010.0, outside),
        ]);

        let outcomes = repo.match_outcomes(march()).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_winner);
        assert!(!outcomes[1].is_winner);
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let repo = MemoryRepo::new();
        let reward = NewReward {
            user_id: 3,
            period: march(),
            category_id: 1,
            value: "1500".to_string(),
        };
        let first = tokio_test::block_on(repo.upsert_reward(&reward)).unwrap();
        let second = tokio_test::block_on(repo.upsert_reward(&NewReward {
            value: "1510".to_string(),
            ..reward.clone()
        }))
        .unwrap();

        assert_eq!(first, second);
        let rewards = repo.rewards();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].value, "1510");
    }

    #[tokio::test]
    async fn test_rating_fault_targets_one_direction() {
        let repo = MemoryRepo::with_participations(vec![play(
            1,
            7,
            GameFormat::ThreeVsThree,
            true,
            1500.0,
            at(2, 10),
        )]);
        repo.inject_fault(
            QueryKind::Rating(GameFormat::ThreeVsThree, Extreme::Highest),
            FaultMode::Error,
        );

        assert!(repo
            .rating_extreme(GameFormat::ThreeVsThree, march(), Extreme::Highest)
            .await
            .is_err());
        let worst = repo
            .rating_extreme(GameFormat::ThreeVsThree, march(), Extreme::Lowest)
            .await
            .unwrap();
        assert_eq!(worst, Some(UserMetric { user_id: 7, metric: 1500.0 }));
    }

    #[test]
    fn test_injected_error_surfaces() {
        let repo = MemoryRepo::new();
        repo.inject_fault(QueryKind::Winrate, FaultMode::Error);
        let result = tokio_test::block_on(repo.winrate_extreme(march(), 10, Extreme::Highest));
        assert!(result.is_err());
    }
}
