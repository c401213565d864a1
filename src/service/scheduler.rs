use crate::config::ScheduleConfig;
use crate::models::Period;
use crate::service::reward_engine::{RewardEngine, RunReport};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{info, warn};

/// Next monthly trigger strictly after `now`. The configured day is clamped to
/// the length of the month.
pub fn next_trigger_after(now: NaiveDateTime, schedule: &ScheduleConfig) -> NaiveDateTime {
    let time =
        NaiveTime::from_hms_opt(schedule.hour, schedule.minute, 0).unwrap_or(NaiveTime::MIN);

    let mut month = Period::containing(now.date());
    loop {
        let day = schedule.day.clamp(1, month.days());
        let candidate = NaiveDate::from_ymd_opt(month.year(), month.month(), day)
            .unwrap_or_else(|| month.first_day())
            .and_time(time);
        if candidate > now {
            return candidate;
        }
        month = month.next();
    }
}

/// Wait for each monthly trigger and compute rewards for the month that just closed.
pub async fn run_monthly(engine: RewardEngine, schedule: ScheduleConfig) {
    loop {
        let now = Local::now().naive_local();
        let trigger = next_trigger_after(now, &schedule);
        let wait = (trigger - now).to_std().unwrap_or_default();

        info!(next_run = %trigger, "Scheduled next reward computation");
        tokio::time::sleep(wait).await;

        let period = Period::previous_of(trigger.date());
        info!(period = %period, "Running monthly reward job");
        let report = engine.run(period).await;
        if !report.all_succeeded() {
            warn!(
                period = %period,
                failed = ?report.failed_rules(),
                "Monthly reward job finished with failures"
            );
        }
    }
}

/// Recompute historical periods one after another.
pub async fn backfill(engine: &RewardEngine, periods: &[Period]) -> Vec<RunReport> {
    let mut reports = Vec::with_capacity(periods.len());
    for period in periods {
        info!(period = %period, "Back-filling rewards");
        reports.push(engine.run(*period).await);
    }
    info!(periods = periods.len(), "Back-fill completed");
    reports
}
