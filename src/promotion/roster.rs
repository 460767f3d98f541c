//! Homeroom roster resolution.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use super::STATUS_ACTIVE;
use crate::db::entities::{academic_year, class, student, tutor};
use crate::error::{Result, ServerError};

/// The class a homeroom teacher is responsible for, with its active students
#[derive(Debug, Clone)]
pub struct HomeroomRoster {
    pub class: class::Model,
    pub academic_year: academic_year::Model,
    pub students: Vec<student::Model>,
}

/// Look up the tutor record behind a user account
pub async fn resolve_tutor<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<tutor::Model> {
    tutor::Entity::find()
        .filter(tutor::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ServerError::NotFound("Tutor".to_string()))
}

/// Resolve the homeroom class of `tutor_id` and its active students.
///
/// A tutor may be homeroom teacher of classes in several academic years; the
/// class in the active year wins, otherwise the most recently started one.
pub async fn resolve_homeroom_roster<C: ConnectionTrait>(
    db: &C,
    tutor_id: i32,
) -> Result<HomeroomRoster> {
    let candidates = class::Entity::find()
        .filter(class::Column::HomeroomTeacherId.eq(tutor_id))
        .find_also_related(academic_year::Entity)
        .all(db)
        .await?;

    let (class, academic_year) = pick_homeroom_class(candidates)
        .ok_or_else(|| ServerError::NotFound("Homeroom class".to_string()))?;

    let students = student::Entity::find()
        .filter(student::Column::ClassId.eq(class.id))
        .filter(student::Column::Status.eq(STATUS_ACTIVE))
        .order_by_asc(student::Column::Name)
        .all(db)
        .await?;

    tracing::debug!(
        "Resolved homeroom class {} ({} active students) for tutor {}",
        class.id,
        students.len(),
        tutor_id
    );

    Ok(HomeroomRoster {
        class,
        academic_year,
        students,
    })
}

fn pick_homeroom_class(
    candidates: Vec<(class::Model, Option<academic_year::Model>)>,
) -> Option<(class::Model, academic_year::Model)> {
    candidates
        .into_iter()
        .filter_map(|(class, year)| year.map(|year| (class, year)))
        .max_by_key(|(class, year)| (year.is_active, year.start_year, year.id, class.id))
}
