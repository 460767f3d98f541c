//! Homeroom teacher endpoints.
//!
//! Every handler resolves the caller's homeroom class first. The class id is
//! never taken from the request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

use super::auth::{CurrentUser, Role};
use super::types::{
    parse_batch_body, ApiResponse, HomeroomPromoteRequest, ProposalView, ProposeRequest, RosterView,
};
use super::AppState;
use crate::error::Result;
use crate::promotion::{
    self, compute_proposals, resolve_homeroom_roster, resolve_tutor, CommitOutcome,
    HomeroomRoster, NominationOutcome,
};

async fn roster_for(state: &AppState, user: &CurrentUser) -> Result<HomeroomRoster> {
    user.require(Role::Tutor)?;
    let tutor = resolve_tutor(state.db.as_ref(), user.id).await?;
    resolve_homeroom_roster(state.db.as_ref(), tutor.id).await
}

/// GET /homeroom/my-students-for-promotion
pub async fn my_students_for_promotion(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<RosterView>>> {
    let roster = roster_for(&state, &user).await?;
    let mut proposals: HashMap<i32, _> = compute_proposals(state.db.as_ref(), roster.class.id)
        .await?
        .into_iter()
        .map(|p| (p.student_id, p))
        .collect();

    // Decisions already committed this cycle are not reviewed again
    let students = roster
        .students
        .into_iter()
        .filter(|student| !student.diproses_naik)
        .filter_map(|student| {
            let proposal = proposals.remove(&student.id)?;
            Some(ProposalView::new(student, &proposal))
        })
        .collect();

    Ok(Json(ApiResponse::ok(RosterView {
        class: roster.class,
        academic_year: roster.academic_year,
        students,
    })))
}

/// PATCH /homeroom/propose-students
pub async fn propose_students(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<NominationOutcome>>> {
    let roster = roster_for(&state, &user).await?;
    let req: ProposeRequest = parse_batch_body(body, "proposals")?;

    let outcome =
        promotion::propose_students(state.db.as_ref(), roster.class.id, &req.proposals).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// PATCH /homeroom/promote-students
pub async fn promote_students(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<CommitOutcome>>> {
    let roster = roster_for(&state, &user).await?;
    let req: HomeroomPromoteRequest = parse_batch_body(body, "promotions")?;

    let outcome = state
        .committer
        .commit(
            state.db.as_ref(),
            roster.class.id,
            req.target_class_id,
            &req.promotions,
        )
        .await?;
    let message = format!("{} students processed", outcome.committed_count);
    Ok(Json(ApiResponse::ok(outcome).with_message(message)))
}
