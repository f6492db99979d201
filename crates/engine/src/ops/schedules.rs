use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::Expr,
};

use crate::{
    EngineError, JsInterpreter, ResultEngine, ScheduleRule, ScriptRunner, Transaction,
    parse_cron, schedule_rules,
};

use super::{Engine, load_accounts, load_currencies, with_tx};

fn check_schedule(rule: &ScheduleRule) -> ResultEngine<()> {
    if rule.title.trim().is_empty() {
        return Err(EngineError::MissingField("title".to_string()));
    }
    if rule.script.trim().is_empty() {
        return Err(EngineError::MissingField("script".to_string()));
    }
    parse_cron(&rule.cron_expression).map(|_| ())
}

impl Engine {
    pub async fn create_schedule_rule(&self, mut rule: ScheduleRule) -> ResultEngine<ScheduleRule> {
        check_schedule(&rule)?;
        let now = Utc::now();
        rule.id = 0;
        rule.created_at = now;
        rule.updated_at = now;
        rule.last_run_at = None;
        rule.deleted_at = None;
        let model = schedule_rules::ActiveModel::from(&rule)
            .insert(&self.database)
            .await?;
        self.notify_schedule_changed();
        ScheduleRule::try_from(model)
    }

    pub async fn update_schedule_rule(&self, mut rule: ScheduleRule) -> ResultEngine<ScheduleRule> {
        check_schedule(&rule)?;
        let current = self.schedule_rule(rule.id).await?;
        rule.created_at = current.created_at;
        rule.last_run_at = current.last_run_at;
        rule.updated_at = Utc::now();
        rule.deleted_at = None;
        let model = schedule_rules::ActiveModel::from(&rule)
            .update(&self.database)
            .await?;
        self.notify_schedule_changed();
        ScheduleRule::try_from(model)
    }

    pub async fn delete_schedule_rule(&self, rule_id: i32) -> ResultEngine<()> {
        let result = schedule_rules::Entity::update_many()
            .col_expr(
                schedule_rules::Column::DeletedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(schedule_rules::Column::Id.eq(rule_id))
            .filter(schedule_rules::Column::DeletedAt.is_null())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::NotFound(format!("schedule rule {rule_id}")));
        }
        self.notify_schedule_changed();
        Ok(())
    }

    pub async fn schedule_rule(&self, rule_id: i32) -> ResultEngine<ScheduleRule> {
        let model = schedule_rules::Entity::find_by_id(rule_id)
            .filter(schedule_rules::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("schedule rule {rule_id}")))?;
        ScheduleRule::try_from(model)
    }

    pub async fn list_schedule_rules(&self) -> ResultEngine<Vec<ScheduleRule>> {
        schedule_rules::Entity::find()
            .filter(schedule_rules::Column::DeletedAt.is_null())
            .order_by_asc(schedule_rules::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(ScheduleRule::try_from)
            .collect()
    }

    /// Fire a scheduled rule once: the script fills an empty transaction
    /// which then goes through the regular write path, inline rules included.
    pub async fn run_schedule_rule(&self, rule: &ScheduleRule) -> ResultEngine<Transaction> {
        if self.is_shut_down() {
            return Err(EngineError::Cancelled);
        }
        let now = Utc::now();
        let written = with_tx!(self, format!("schedule rule {}", rule.id), |db_tx| {
            let currencies = load_currencies(&db_tx).await?;
            let accounts: Vec<_> = load_accounts(&db_tx).await?.into_values().collect();
            let mut candidate = Transaction::empty(now);
            JsInterpreter::new(&currencies, &accounts)?
                .run(&rule.script, &mut candidate)
                .map_err(|err| match err {
                    EngineError::Script(message) => EngineError::Script(format!(
                        "schedule rule {} ({}): {message}",
                        rule.id, rule.title
                    )),
                    other => other,
                })?;
            candidate.created_at = now;
            candidate.updated_at = now;

            let written = self
                .write_transactions(&db_tx, vec![candidate], false)
                .await?;
            schedule_rules::Entity::update_many()
                .col_expr(schedule_rules::Column::LastRunAt, Expr::value(Some(now)))
                .filter(schedule_rules::Column::Id.eq(rule.id))
                .exec(&db_tx)
                .await?;
            Ok::<_, EngineError>(written)
        })?;
        self.after_commit(&written);
        written
            .transactions
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Internal("scheduled rule wrote nothing".to_string()))
    }
}
