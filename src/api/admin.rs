//! Admin endpoints: the system-wide review queue, commit on behalf of any
//! class, academic-year activation and history corrections.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use sea_orm::EntityTrait;
use serde_json::Value;

use super::auth::{CurrentUser, Role};
use super::types::{
    parse_batch_body, parse_body, AdminPromoteRequest, ApiResponse, HistoryCorrectionRequest,
    PendingQuery, ProposalView,
};
use super::AppState;
use crate::academic_year;
use crate::db::entities::{academic_year as academic_year_entity, student, student_class_history};
use crate::error::{Result, ServerError};
use crate::promotion::{
    correct_history, list_history, list_pending_proposals, CommitOutcome, HistoryCorrection,
};

fn path_id(path: std::result::Result<Path<i32>, PathRejection>) -> Result<i32> {
    path.map(|Path(id)| id)
        .map_err(|e| ServerError::Validation(e.body_text()))
}

/// GET /admin/promote-students?classId=
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    query: std::result::Result<Query<PendingQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProposalView>>>> {
    user.require(Role::Admin)?;
    let Query(query) = query.map_err(|e| ServerError::Validation(e.body_text()))?;

    let views = list_pending_proposals(state.db.as_ref(), query.class_id)
        .await?
        .into_iter()
        .map(|(student, proposal)| ProposalView::new(student, &proposal))
        .collect();
    Ok(Json(ApiResponse::ok(views)))
}

/// PATCH /admin/promote-students/process
pub async fn process_promotions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<CommitOutcome>>> {
    user.require(Role::Admin)?;
    let req: AdminPromoteRequest = parse_batch_body(body, "promotions")?;

    tracing::info!(
        "Admin '{}' processing {} promotion decisions for class {}",
        user.username,
        req.promotions.len(),
        req.class_id
    );
    let outcome = state
        .committer
        .commit(
            state.db.as_ref(),
            req.class_id,
            req.target_class_id,
            &req.promotions,
        )
        .await?;
    let message = format!("{} students processed", outcome.committed_count);
    Ok(Json(ApiResponse::ok(outcome).with_message(message)))
}

/// GET /admin/academic-years/active
pub async fn active_academic_year(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<academic_year_entity::Model>>> {
    user.require(Role::Admin)?;
    let year = academic_year::active_year(state.db.as_ref())
        .await?
        .ok_or_else(|| ServerError::NotFound("Active academic year".to_string()))?;
    Ok(Json(ApiResponse::ok(year)))
}

/// PATCH /admin/academic-years/:id/activate
pub async fn activate_academic_year(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<ApiResponse<academic_year_entity::Model>>> {
    user.require(Role::Admin)?;
    let id = path_id(id)?;
    let year = academic_year::activate(state.db.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(year)))
}

/// GET /admin/students/:id/class-history
pub async fn class_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<ApiResponse<Vec<student_class_history::Model>>>> {
    user.require(Role::Admin)?;
    let id = path_id(id)?;
    student::Entity::find_by_id(id)
        .one(state.db.as_ref())
        .await?
        .ok_or_else(|| ServerError::NotFound("Student".to_string()))?;

    let rows = list_history(state.db.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// PATCH /admin/class-history/:id
pub async fn correct_class_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    id: std::result::Result<Path<i32>, PathRejection>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<student_class_history::Model>>> {
    user.require(Role::Admin)?;
    let id = path_id(id)?;
    let req: HistoryCorrectionRequest = parse_body(body)?;

    let row = correct_history(
        state.db.as_ref(),
        id,
        HistoryCorrection {
            naik_kelas: req.naik_kelas,
            nilai_akhir: req.nilai_akhir,
        },
    )
    .await?;
    tracing::info!("Admin '{}' corrected class history {}", user.username, row.id);
    Ok(Json(ApiResponse::ok(row)))
}
