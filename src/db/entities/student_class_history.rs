//! Student class history entity
//!
//! Append-only snapshot written when a promotion decision is committed.
//! Rows are never deleted; only `naik_kelas` and `nilai_akhir` may be corrected.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "student_class_history")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub student_id: i32,
    /// Class the student was in when the decision was made
    pub class_id: i32,
    pub academic_year_id: i32,
    pub naik_kelas: bool,
    pub nilai_akhir: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
