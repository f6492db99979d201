//! Cron driven execution of scheduled rules.
//!
//! Every enabled rule gets its own task that sleeps until the next fire time.
//! Any change to the scheduled rules rebuilds the whole set: the new tasks
//! are spawned first, then the old ones are aborted.

use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::{sync::Mutex, task::JoinSet};

use crate::{Engine, ResultEngine, ScheduleRule, parse_cron};

pub struct RuleScheduler {
    engine: Arc<Engine>,
    jobs: Mutex<Option<JoinSet<()>>>,
}

impl RuleScheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            jobs: Mutex::new(None),
        }
    }

    /// Replace the running jobs with one per enabled rule. Rules with an
    /// unparsable expression are skipped. Returns the number of jobs.
    pub async fn reinit(&self) -> ResultEngine<usize> {
        let mut jobs = self.jobs.lock().await;
        let rules = self.engine.list_schedule_rules().await?;

        let mut set = JoinSet::new();
        for rule in rules.into_iter().filter(|r| r.enabled) {
            let schedule = match parse_cron(&rule.cron_expression) {
                Ok(schedule) => schedule,
                Err(err) => {
                    tracing::warn!(rule_id = rule.id, %err, "schedule rule skipped");
                    continue;
                }
            };
            set.spawn(run_job(Arc::clone(&self.engine), rule, schedule));
        }

        let count = set.len();
        if let Some(mut old) = jobs.replace(set) {
            old.abort_all();
        }
        tracing::info!(jobs = count, "scheduler initialised");
        Ok(count)
    }

    /// Initialise, then follow schedule changes until the engine shuts down.
    pub async fn run(self: Arc<Self>) {
        let mut changes = self.engine.schedule_changes();
        if let Err(err) = self.reinit().await {
            tracing::error!(%err, "scheduler init failed");
        }
        while changes.changed().await.is_ok() {
            if self.engine.is_shut_down() {
                break;
            }
            if let Err(err) = self.reinit().await {
                tracing::error!(%err, "scheduler reinit failed");
            }
        }
        self.shutdown().await;
    }

    /// Stop every job and wait for them to finish.
    pub async fn shutdown(&self) {
        if let Some(mut set) = self.jobs.lock().await.take() {
            set.shutdown().await;
        }
    }
}

async fn run_job(engine: Arc<Engine>, rule: ScheduleRule, schedule: Schedule) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        if engine.is_shut_down() {
            break;
        }
        match engine.run_schedule_rule(&rule).await {
            Ok(tx) => {
                tracing::info!(rule_id = rule.id, transaction_id = tx.id, "scheduled rule fired");
            }
            Err(err) => {
                tracing::error!(rule_id = rule.id, title = %rule.title, %err, "scheduled rule failed");
            }
        }
    }
}
