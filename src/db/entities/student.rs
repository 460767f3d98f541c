//! Student entity
//!
//! `naik_kelas` marks a student as proposed for promotion; `diproses_naik`
//! marks that proposal as resolved for the current cycle.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "students")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    pub nis: String,
    pub class_id: Option<i32>,
    pub status: String, // "ACTIVE", "INACTIVE", "GRADUATED"
    pub naik_kelas: bool,
    pub diproses_naik: bool,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
    #[sea_orm(has_many = "super::final_score::Entity")]
    FinalScores,
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendances,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::final_score::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinalScores.def()
    }
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
