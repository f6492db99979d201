use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, InterpreterType, ResultEngine};

/// A rule fired by cron. Its script starts from an empty transaction and is
/// expected to fill every field the transaction type needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub id: i32,
    pub title: String,
    pub script: String,
    pub interpreter_type: InterpreterType,
    pub cron_expression: String,
    pub enabled: bool,
    pub group_name: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ScheduleRule {
    pub fn new(title: &str, script: &str, cron_expression: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: title.to_string(),
            script: script.to_string(),
            interpreter_type: InterpreterType::default(),
            cron_expression: cron_expression.trim().to_string(),
            enabled: true,
            group_name: String::new(),
            last_run_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Parse a cron expression.
///
/// Classic five-field expressions (`m h dom mon dow`) get a leading seconds
/// field so they run at second zero.
pub fn parse_cron(expression: &str) -> ResultEngine<Schedule> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|err| EngineError::InvalidFormat(format!("invalid cron \"{trimmed}\": {err}")))
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "schedule_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub script: String,
    pub interpreter_type: String,
    pub cron_expression: String,
    pub enabled: bool,
    pub group_name: String,
    pub last_run_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ScheduleRule> for ActiveModel {
    fn from(value: &ScheduleRule) -> Self {
        Self {
            id: if value.id == 0 {
                ActiveValue::NotSet
            } else {
                ActiveValue::Set(value.id)
            },
            title: ActiveValue::Set(value.title.clone()),
            script: ActiveValue::Set(value.script.clone()),
            interpreter_type: ActiveValue::Set(value.interpreter_type.as_str().to_string()),
            cron_expression: ActiveValue::Set(value.cron_expression.clone()),
            enabled: ActiveValue::Set(value.enabled),
            group_name: ActiveValue::Set(value.group_name.clone()),
            last_run_at: ActiveValue::Set(value.last_run_at),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
            deleted_at: ActiveValue::Set(value.deleted_at),
        }
    }
}

impl TryFrom<Model> for ScheduleRule {
    type Error = EngineError;

    fn try_from(value: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: value.id,
            title: value.title,
            script: value.script,
            interpreter_type: InterpreterType::try_from(value.interpreter_type.as_str())?,
            cron_expression: value.cron_expression,
            enabled: value.enabled,
            group_name: value.group_name,
            last_run_at: value.last_run_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expressions_are_accepted() {
        let schedule = parse_cron("30 9 * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.format("%M:%S").to_string(), "30:00");
    }

    #[test]
    fn six_field_expressions_pass_through() {
        assert!(parse_cron("0 0 12 * * Mon").is_ok());
    }

    #[test]
    fn garbage_is_invalid_format() {
        let err = parse_cron("every day").unwrap_err();
        assert!(matches!(err, EngineError::InvalidFormat(_)));
    }
}
