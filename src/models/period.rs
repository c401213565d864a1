use crate::error::RewardError;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month identified by `(year, month)`. Only constructed through
/// validating constructors, so the month bounds always exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = RewardError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Period::new(raw.year, raw.month)
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, RewardError> {
        if !(1..=12).contains(&month) {
            return Err(RewardError::invalid_period(format!(
                "month must be within 1..=12, got {}",
                month
            )));
        }
        // Rejects years chrono cannot represent
        NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            RewardError::invalid_period(format!("year {} is out of range", year))
        })?;
        Ok(Self { year, month })
    }

    /// Parse the `("YYYY", "MM")` pair handed over by the scheduler.
    pub fn parse(year: &str, month: &str) -> Result<Self, RewardError> {
        let year_str = year.trim();
        let month_str = month.trim();

        if year_str.len() != 4 || !year_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(RewardError::invalid_period(format!(
                "year must be formatted as YYYY, got {:?}",
                year
            )));
        }
        if month_str.is_empty()
            || month_str.len() > 2
            || !month_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(RewardError::invalid_period(format!(
                "month must be formatted as MM, got {:?}",
                month
            )));
        }

        let year: i32 = year_str
            .parse()
            .map_err(|_| RewardError::invalid_period(format!("bad year {:?}", year_str)))?;
        let month: u32 = month_str
            .parse()
            .map_err(|_| RewardError::invalid_period(format!("bad month {:?}", month_str)))?;

        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month `date` falls in.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The last fully closed month before `date`.
    pub fn previous_of(date: NaiveDate) -> Self {
        if date.month() == 1 {
            Self {
                year: date.year() - 1,
                month: 12,
            }
        } else {
            Self {
                year: date.year(),
                month: date.month() - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Inclusive lower bound of the period.
    pub fn start(&self) -> NaiveDateTime {
        self.first_day().and_time(chrono::NaiveTime::MIN)
    }

    /// Exclusive upper bound of the period.
    pub fn end(&self) -> NaiveDateTime {
        self.next().start()
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start() && at < self.end()
    }

    pub fn days(&self) -> u32 {
        (self.next().first_day() - self.first_day()).num_days() as u32
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = RewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| RewardError::invalid_period(format!("expected YYYY-MM, got {:?}", s)))?;
        Self::parse(year, month)
    }
}
