use crate::models::Period;
use crate::service::reward_writer::WritePolicy;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    /// When non-empty the binary back-fills these periods and exits.
    pub backfill: Vec<Period>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// Monthly trigger, in local time.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub rule_timeout_secs: u64,
    pub write_policy: WritePolicy,
}

impl EngineConfig {
    pub fn rule_timeout(&self) -> Duration {
        Duration::from_secs(self.rule_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("POSTGRES_CONNECTION"))
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;
        let max_connections: u32 = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?;
        let run_migrations = parse_flag(&lookup, "RUN_MIGRATIONS", false)?;

        let day: u32 = parse_or(&lookup, "SCHEDULE_DAY", 1)?;
        let hour: u32 = parse_or(&lookup, "SCHEDULE_HOUR", 3)?;
        let minute: u32 = parse_or(&lookup, "SCHEDULE_MINUTE", 0)?;
        if !(1..=31).contains(&day) || hour > 23 || minute > 59 {
            return Err(anyhow!(
                "invalid schedule: day {} hour {} minute {}",
                day,
                hour,
                minute
            ));
        }

        let rule_timeout_secs: u64 = parse_or(&lookup, "RULE_TIMEOUT_SECS", 60)?;
        let write_policy = match lookup("REWARD_WRITE_POLICY") {
            Some(value) => value.parse::<WritePolicy>().map_err(|e| anyhow!(e))?,
            None => WritePolicy::default(),
        };

        let backfill = match lookup("BACKFILL_PERIODS") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Period>())
                .collect::<Result<Vec<_>, _>>()
                .context("BACKFILL_PERIODS must be a comma-separated list of YYYY-MM")?,
            None => Vec::new(),
        };

        let port: u16 = parse_or(&lookup, "PORT", 8080)?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "rewards_engine=info".to_string());

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                run_migrations,
            },
            schedule: ScheduleConfig { day, hour, minute },
            engine: EngineConfig {
                rule_timeout_secs,
                write_policy,
            },
            server: ServerConfig { port, host, rust_log },
            backfill,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} has an invalid value {:?}: expected a boolean", key, raw)),
    }
}
