//! Active academic year selection.
//!
//! The active year is a flag on `academic_years`; activation clears every
//! other flag in the same transaction so at most one row is ever active.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};

use crate::db::entities::academic_year;
use crate::error::{Result, ServerError};

/// The currently active academic year, if any
pub async fn active_year<C: ConnectionTrait>(db: &C) -> Result<Option<academic_year::Model>> {
    Ok(academic_year::Entity::find()
        .filter(academic_year::Column::IsActive.eq(true))
        .one(db)
        .await?)
}

/// Make `id` the only active academic year
pub async fn activate(db: &DatabaseConnection, id: i32) -> Result<academic_year::Model> {
    let txn = db.begin().await?;

    let year = academic_year::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServerError::NotFound("Academic year".to_string()))?;

    academic_year::Entity::update_many()
        .col_expr(academic_year::Column::IsActive, Expr::value(false))
        .filter(academic_year::Column::IsActive.eq(true))
        .filter(academic_year::Column::Id.ne(id))
        .exec(&txn)
        .await?;

    let mut active: academic_year::ActiveModel = year.into();
    active.is_active = Set(true);
    let year = active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!(
        "Activated academic year {} ({}/{} {})",
        year.id,
        year.start_year,
        year.end_year,
        year.semester
    );
    Ok(year)
}
