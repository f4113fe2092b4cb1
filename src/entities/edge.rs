use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "edges")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub from_id: String,
    pub to_id: String,
    /// "owns" | "contains" | "access.to" | "access.to.namespace"
    pub label: String,
    /// Grant facet: "READ" | "WRITE"
    pub permission: Option<String>,
    /// Grant facet on object grants: 0 | 1
    pub inherit: Option<i64>,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
