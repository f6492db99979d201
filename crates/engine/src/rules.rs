//! User rules: inline rules run on every new transaction, scheduled rules run
//! on a cron expression and synthesize new transactions.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpreterType {
    #[default]
    Javascript,
}

impl InterpreterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
        }
    }
}

impl TryFrom<&str> for InterpreterType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Self::Javascript),
            other => Err(EngineError::InvalidFormat(format!(
                "unsupported interpreter: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i32,
    pub title: String,
    pub script: String,
    pub interpreter_type: InterpreterType,
    pub sort_order: i32,
    pub group_name: String,
    pub enabled: bool,
    pub is_final_rule: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Rule {
    pub fn new(title: &str, script: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: title.to_string(),
            script: script.to_string(),
            interpreter_type: InterpreterType::default(),
            sort_order: 0,
            group_name: String::new(),
            enabled: true,
            is_final_rule: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn group(mut self, name: &str, sort_order: i32) -> Self {
        self.group_name = name.to_string();
        self.sort_order = sort_order;
        self
    }

    #[must_use]
    pub fn final_rule(mut self) -> Self {
        self.is_final_rule = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub script: String,
    pub interpreter_type: String,
    pub sort_order: i32,
    pub group_name: String,
    pub enabled: bool,
    pub is_final_rule: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Rule> for ActiveModel {
    fn from(value: &Rule) -> Self {
        Self {
            id: if value.id == 0 {
                ActiveValue::NotSet
            } else {
                ActiveValue::Set(value.id)
            },
            title: ActiveValue::Set(value.title.clone()),
            script: ActiveValue::Set(value.script.clone()),
            interpreter_type: ActiveValue::Set(value.interpreter_type.as_str().to_string()),
            sort_order: ActiveValue::Set(value.sort_order),
            group_name: ActiveValue::Set(value.group_name.clone()),
            enabled: ActiveValue::Set(value.enabled),
            is_final_rule: ActiveValue::Set(value.is_final_rule),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
            deleted_at: ActiveValue::Set(value.deleted_at),
        }
    }
}

impl TryFrom<Model> for Rule {
    type Error = EngineError;

    fn try_from(value: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: value.id,
            title: value.title,
            script: value.script,
            interpreter_type: InterpreterType::try_from(value.interpreter_type.as_str())?,
            sort_order: value.sort_order,
            group_name: value.group_name,
            enabled: value.enabled,
            is_final_rule: value.is_final_rule,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}
