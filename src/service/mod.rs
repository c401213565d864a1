// Service layer of the rewards engine
pub mod award_rules;
pub mod reward_engine;
pub mod reward_writer;
pub mod scheduler;
pub mod streak_analyzer;


pub use award_rules::{AwardRule, WINRATE_FLOOR};
pub use reward_engine::{EngineSettings, RewardEngine, RuleOutcome, RuleReport, RunReport};
pub use reward_writer::{RewardWriter, WritePolicy};
pub use streak_analyzer::StreakRecord;
