//! Tags and categories.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::{EngineError, Label, ResultEngine, categories, tags};

use super::{Engine, normalize_required_name};

impl Engine {
    pub async fn create_tag(&self, name: &str) -> ResultEngine<Label> {
        let name = normalize_required_name(name, "tag")?;
        if tags::Entity::find()
            .filter(tags::Column::Name.eq(name.as_str()))
            .filter(tags::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(format!("tag \"{name}\" already exists")));
        }
        let model = tags::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(name),
            created_at: ActiveValue::Set(Utc::now()),
            deleted_at: ActiveValue::Set(None),
        }
        .insert(&self.database)
        .await?;
        Ok(model.into())
    }

    pub async fn list_tags(&self) -> ResultEngine<Vec<Label>> {
        Ok(tags::Entity::find()
            .filter(tags::Column::DeletedAt.is_null())
            .order_by_asc(tags::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Label::from)
            .collect())
    }

    pub async fn create_category(&self, name: &str) -> ResultEngine<Label> {
        let name = normalize_required_name(name, "category")?;
        if categories::Entity::find()
            .filter(categories::Column::Name.eq(name.as_str()))
            .filter(categories::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(format!(
                "category \"{name}\" already exists"
            )));
        }
        let model = categories::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(name),
            created_at: ActiveValue::Set(Utc::now()),
            deleted_at: ActiveValue::Set(None),
        }
        .insert(&self.database)
        .await?;
        Ok(model.into())
    }

    pub async fn list_categories(&self) -> ResultEngine<Vec<Label>> {
        Ok(categories::Entity::find()
            .filter(categories::Column::DeletedAt.is_null())
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Label::from)
            .collect())
    }
}
