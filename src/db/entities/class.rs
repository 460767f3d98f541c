//! Class entity

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "classes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub program_id: i32,
    pub academic_year_id: i32,
    pub homeroom_teacher_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::academic_year::Entity",
        from = "Column::AcademicYearId",
        to = "super::academic_year::Column::Id"
    )]
    AcademicYear,
    #[sea_orm(
        belongs_to = "super::tutor::Entity",
        from = "Column::HomeroomTeacherId",
        to = "super::tutor::Column::Id"
    )]
    HomeroomTeacher,
    #[sea_orm(has_many = "super::student::Entity")]
    Students,
}

impl Related<super::academic_year::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AcademicYear.def()
    }
}

impl Related<super::tutor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HomeroomTeacher.def()
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
