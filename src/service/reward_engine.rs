use crate::error::RewardError;
use crate::models::{Period, RewardId};
use crate::repo::Repo;
use crate::service::award_rules::AwardRule;
use crate::service::reward_writer::{RewardWriter, WritePolicy};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Deadline for a single rule; expiry fails only that rule.
    pub rule_timeout: Duration,
    pub write_policy: WritePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rule_timeout: Duration::from_secs(60),
            write_policy: WritePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleOutcome {
    Completed { reward_ids: Vec<RewardId> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleReport {
    pub rule: AwardRule,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

/// Result aggregate of one engine run. Partial completion is a normal
/// terminal state; the report only makes it observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub period: Period,
    pub rules: Vec<RuleReport>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.rules
            .iter()
            .all(|r| matches!(r.outcome, RuleOutcome::Completed { .. }))
    }

    pub fn rewards_written(&self) -> usize {
        self.rules
            .iter()
            .map(|r| match &r.outcome {
                RuleOutcome::Completed { reward_ids } => reward_ids.len(),
                RuleOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_rules(&self) -> Vec<AwardRule> {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Failed { .. }))
            .map(|r| r.rule)
            .collect()
    }

    pub fn outcome(&self, rule: AwardRule) -> Option<&RuleOutcome> {
        self.rules.iter().find(|r| r.rule == rule).map(|r| &r.outcome)
    }
}

/// Runs every award rule for a period, each rule isolated in its own task.
#[derive(Clone)]
pub struct RewardEngine {
    repo: Arc<dyn Repo>,
    writer: RewardWriter,
    settings: EngineSettings,
}

impl RewardEngine {
    pub fn new(repo: Arc<dyn Repo>, settings: EngineSettings) -> Self {
        let writer = RewardWriter::new(repo.clone(), settings.write_policy);
        Self {
            repo,
            writer,
            settings,
        }
    }

    /// Entry point handed to the scheduler: `("YYYY", "MM")` of the closed month.
    pub async fn compute_monthly_rewards(
        &self,
        year: &str,
        month: &str,
    ) -> Result<RunReport, RewardError> {
        let period = Period::parse(year, month).map_err(|e| {
            error!(year = year, month = month, error = %e, "Rejected reward computation request");
            e
        })?;
        Ok(self.run(period).await)
    }

    pub async fn run(&self, period: Period) -> RunReport {
        info!(
            year = period.year(),
            month = period.month(),
            policy = %self.settings.write_policy,
            "Processing rewards"
        );

        let handles: Vec<_> = AwardRule::ALL
            .iter()
            .map(|&rule| {
                let repo = self.repo.clone();
                let writer = self.writer.clone();
                let timeout = self.settings.rule_timeout;
                tokio::spawn(async move { run_rule(rule, repo, writer, period, timeout).await })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let rules: Vec<RuleReport> = AwardRule::ALL
            .iter()
            .zip(joined)
            .map(|(&rule, joined)| {
                let result = match joined {
                    Ok(result) => result,
                    Err(join_error) if join_error.is_panic() => {
                        let message = panic_message(join_error.into_panic());
                        error!(
                            year = period.year(),
                            month = period.month(),
                            rule = %rule,
                            panic = %message,
                            "Recovered from panic in reward rule"
                        );
                        Err(RewardError::UnexpectedFault(message))
                    }
                    Err(join_error) => Err(RewardError::UnexpectedFault(join_error.to_string())),
                };

                let outcome = match result {
                    Ok(reward_ids) => RuleOutcome::Completed { reward_ids },
                    Err(e) => RuleOutcome::Failed {
                        error: e.to_string(),
                    },
                };
                RuleReport { rule, outcome }
            })
            .collect();

        let report = RunReport { period, rules };

        let summary = serde_json::to_string(&report).unwrap_or_default();
        if report.all_succeeded() {
            info!(
                year = period.year(),
                month = period.month(),
                rewards = report.rewards_written(),
                report = %summary,
                "Finished processing rewards"
            );
        } else {
            warn!(
                year = period.year(),
                month = period.month(),
                rewards = report.rewards_written(),
                failed = ?report.failed_rules(),
                report = %summary,
                "Finished processing rewards with failures"
            );
        }

        report
    }
}

async fn run_rule(
    rule: AwardRule,
    repo: Arc<dyn Repo>,
    writer: RewardWriter,
    period: Period,
    timeout: Duration,
) -> Result<Vec<RewardId>, RewardError> {
    info!(year = period.year(), month = period.month(), rule = %rule, "Processing reward rule");

    let result = match tokio::time::timeout(timeout, rule.evaluate(&repo, &writer, period)).await {
        Ok(result) => result,
        Err(_) => Err(RewardError::Timeout {
            rule: rule.to_string(),
            timeout,
        }),
    };

    match &result {
        Ok(reward_ids) => info!(
            year = period.year(),
            month = period.month(),
            rule = %rule,
            rewards = reward_ids.len(),
            "Successfully processed reward rule"
        ),
        Err(e) => error!(
            year = period.year(),
            month = period.month(),
            rule = %rule,
            error = %e,
            "Failed to process reward rule"
        ),
    }

    result
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
