//! Keys of already imported source rows.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "import_deduplications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub import_source: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub transaction_id: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
