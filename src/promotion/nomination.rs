//! Explicit promotion nominations by the homeroom teacher.
//!
//! This is the write path that moves students between PENDING and PROPOSED.
//! Students whose decision was already committed are left alone.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;

use super::{
    ensure_unique_students, PromotionDecision, SkipReason, SkippedStudent, STATUS_ACTIVE,
};
use crate::db::entities::student;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationOutcome {
    pub updated_count: usize,
    pub skipped: Vec<SkippedStudent>,
}

/// Set or clear `naik_kelas` for students of `class_id`
pub async fn propose_students(
    db: &DatabaseConnection,
    class_id: i32,
    proposals: &[PromotionDecision],
) -> Result<NominationOutcome> {
    ensure_unique_students(proposals)?;

    let txn = db.begin().await?;
    let mut members: HashMap<i32, student::Model> = student::Entity::find()
        .filter(student::Column::ClassId.eq(class_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut outcome = NominationOutcome::default();
    for proposal in proposals {
        let reason = match members.remove(&proposal.student_id) {
            None => Some(SkipReason::NotInClass),
            Some(s) if s.diproses_naik => Some(SkipReason::AlreadyProcessed),
            Some(s) if s.status != STATUS_ACTIVE => Some(SkipReason::NotActive),
            Some(s) if s.naik_kelas == proposal.naik_kelas => None,
            Some(s) => {
                let mut active: student::ActiveModel = s.into();
                active.naik_kelas = Set(proposal.naik_kelas);
                active.update(&txn).await?;
                None
            }
        };

        match reason {
            Some(reason) => outcome.skipped.push(SkippedStudent {
                student_id: proposal.student_id,
                reason,
            }),
            None => outcome.updated_count += 1,
        }
    }

    txn.commit().await?;
    tracing::info!(
        "Updated promotion nominations for class {}: {} updated, {} skipped",
        class_id,
        outcome.updated_count,
        outcome.skipped.len()
    );
    Ok(outcome)
}
