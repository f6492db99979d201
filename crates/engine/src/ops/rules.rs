use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::Expr,
};
use serde::Serialize;

use crate::{
    EngineError, JsInterpreter, ResultEngine, Rule, RuleExecutor, Transaction, rules,
    transactions,
};

use super::{Engine, load_accounts, load_currencies, with_tx};

/// What a rule would do to a transaction, without storing anything.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DryRunResult {
    pub before: Transaction,
    pub after: Transaction,
    pub modified: bool,
}

/// Enabled, non-deleted inline rules.
pub(crate) async fn load_rules<C: ConnectionTrait>(conn: &C) -> ResultEngine<Vec<Rule>> {
    rules::Entity::find()
        .filter(rules::Column::DeletedAt.is_null())
        .filter(rules::Column::Enabled.eq(true))
        .all(conn)
        .await?
        .into_iter()
        .map(Rule::try_from)
        .collect()
}

fn check_rule(rule: &Rule) -> ResultEngine<()> {
    if rule.title.trim().is_empty() {
        return Err(EngineError::MissingField("title".to_string()));
    }
    if rule.script.trim().is_empty() {
        return Err(EngineError::MissingField("script".to_string()));
    }
    Ok(())
}

impl Engine {
    pub async fn create_rule(&self, mut rule: Rule) -> ResultEngine<Rule> {
        check_rule(&rule)?;
        let now = Utc::now();
        rule.id = 0;
        rule.created_at = now;
        rule.updated_at = now;
        rule.deleted_at = None;
        let model = rules::ActiveModel::from(&rule)
            .insert(&self.database)
            .await?;
        Rule::try_from(model)
    }

    pub async fn update_rule(&self, mut rule: Rule) -> ResultEngine<Rule> {
        check_rule(&rule)?;
        let current = self.rule(rule.id).await?;
        rule.created_at = current.created_at;
        rule.updated_at = Utc::now();
        rule.deleted_at = None;
        let model = rules::ActiveModel::from(&rule)
            .update(&self.database)
            .await?;
        Rule::try_from(model)
    }

    /// Soft delete.
    pub async fn delete_rule(&self, rule_id: i32) -> ResultEngine<()> {
        let result = rules::Entity::update_many()
            .col_expr(rules::Column::DeletedAt, Expr::value(Some(Utc::now())))
            .filter(rules::Column::Id.eq(rule_id))
            .filter(rules::Column::DeletedAt.is_null())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::NotFound(format!("rule {rule_id}")));
        }
        Ok(())
    }

    pub async fn rule(&self, rule_id: i32) -> ResultEngine<Rule> {
        let model = rules::Entity::find_by_id(rule_id)
            .filter(rules::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("rule {rule_id}")))?;
        Rule::try_from(model)
    }

    /// Non-deleted rules in execution order.
    pub async fn list_rules(&self) -> ResultEngine<Vec<Rule>> {
        rules::Entity::find()
            .filter(rules::Column::DeletedAt.is_null())
            .order_by_asc(rules::Column::GroupName)
            .order_by_asc(rules::Column::SortOrder)
            .order_by_asc(rules::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Rule::try_from)
            .collect()
    }

    /// Run `script` against a stored transaction (or an empty one) and
    /// report the result. Nothing is written.
    pub async fn dry_run_rule(
        &self,
        script: &str,
        transaction_id: Option<i64>,
    ) -> ResultEngine<DryRunResult> {
        let rule = Rule::new("dry run", script);
        check_rule(&rule)?;
        let (before, currencies, accounts) = with_tx!(self, |db_tx| {
            let before = match transaction_id {
                Some(id) => {
                    let model = transactions::Entity::find_by_id(id)
                        .filter(transactions::Column::DeletedAt.is_null())
                        .one(&db_tx)
                        .await?
                        .ok_or_else(|| EngineError::NotFound(format!("transaction {id}")))?;
                    Transaction::try_from(model)?
                }
                None => Transaction::empty(Utc::now()),
            };
            let currencies = load_currencies(&db_tx).await?;
            let accounts: Vec<_> = load_accounts(&db_tx).await?.into_values().collect();
            Ok::<_, EngineError>((before, currencies, accounts))
        })?;

        let interpreter = JsInterpreter::new(&currencies, &accounts)?;
        let execution = RuleExecutor::new([rule]).execute(&before, &interpreter, &self.cancelled)?;
        Ok(DryRunResult {
            before,
            after: execution.transaction,
            modified: execution.modified,
        })
    }
}
