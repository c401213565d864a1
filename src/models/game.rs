use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type UserId = i64;
pub type MatchId = i64;

/// Party size of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameFormat {
    OneVsOne,
    TwoVsTwo,
    ThreeVsThree,
    FourVsFour,
    FiveVsFive,
}

impl GameFormat {
    pub const ALL: [GameFormat; 5] = [
        GameFormat::OneVsOne,
        GameFormat::TwoVsTwo,
        GameFormat::ThreeVsThree,
        GameFormat::FourVsFour,
        GameFormat::FiveVsFive,
    ];

    /// Value of `game.game.type` for this format.
    pub fn db_type(&self) -> &'static str {
        match self {
            GameFormat::OneVsOne => "1x1",
            GameFormat::TwoVsTwo => "2x2",
            GameFormat::ThreeVsThree => "3x3",
            GameFormat::FourVsFour => "4x4",
            GameFormat::FiveVsFive => "5x5",
        }
    }

    pub fn party_size(&self) -> u8 {
        match self {
            GameFormat::OneVsOne => 1,
            GameFormat::TwoVsTwo => 2,
            GameFormat::ThreeVsThree => 3,
            GameFormat::FourVsFour => 4,
            GameFormat::FiveVsFive => 5,
        }
    }
}

impl std::fmt::Display for GameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.party_size();
        write!(f, "{}v{}", size, size)
    }
}

/// One user's part in a finished match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub match_id: MatchId,
    pub format: GameFormat,
    pub user_id: UserId,
    pub is_winner: bool,
    pub rating_before: f64,
    pub rating_after: f64,
    pub team_created_at: NaiveDateTime,
    pub match_ended_at: NaiveDateTime,
}

impl Participation {
    pub fn rating_delta(&self) -> f64 {
        self.rating_after - self.rating_before
    }
}

/// Input row of the win-streak replay, ordered by match completion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MatchOutcome {
    pub user_id: UserId,
    pub is_winner: bool,
    pub played_at: NaiveDateTime,
}
