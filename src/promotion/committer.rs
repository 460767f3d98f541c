//! Promotion commit.
//!
//! Writes one `student_class_history` row per decided student and moves
//! promoted students to the target class, all inside one transaction.

use std::future::Future;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;

use super::proposer::average_final_score;
use super::{
    ensure_unique_students, PromotionDecision, SkipReason, SkippedStudent, STATUS_ACTIVE,
};
use crate::db::entities::{class, student, student_class_history};
use crate::db::now_unix;
use crate::error::{Result, ServerError};

/// Result of a commit call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub committed_count: usize,
    pub skipped: Vec<SkippedStudent>,
}

/// Commits reviewer decisions, retrying the whole transaction on connection errors
#[derive(Debug, Clone)]
pub struct PromotionCommitter {
    attempts: u32,
}

impl Default for PromotionCommitter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PromotionCommitter {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    /// Commit `decisions` for students of `class_id`.
    ///
    /// `target_class_id` is required as soon as one decision promotes. The
    /// caller must already have established authority over `class_id`.
    pub async fn commit(
        &self,
        db: &DatabaseConnection,
        class_id: i32,
        target_class_id: Option<i32>,
        decisions: &[PromotionDecision],
    ) -> Result<CommitOutcome> {
        ensure_unique_students(decisions)?;
        let target_class_id = match target_class_id {
            Some(target) if target == class_id => {
                return Err(ServerError::Validation(
                    "targetClassId must differ from the current class".to_string(),
                ));
            }
            Some(target) => Some(target),
            None if decisions.iter().any(|d| d.naik_kelas) => {
                return Err(ServerError::Validation(
                    "targetClassId is required to promote students".to_string(),
                ));
            }
            None => None,
        };

        retry_transient(self.attempts, class_id, || {
            commit_once(db, class_id, target_class_id, decisions)
        })
        .await
    }
}

/// Run `op`, repeating it while it fails with a transient error and attempts
/// remain. Each call of `op` is a fresh transaction.
async fn retry_transient<F, Fut, T>(attempts: u32, class_id: i32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::warn!(
                    "Promotion commit for class {} failed (attempt {}/{}): {}",
                    class_id,
                    attempt,
                    attempts,
                    e
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn commit_once(
    db: &DatabaseConnection,
    class_id: i32,
    target_class_id: Option<i32>,
    decisions: &[PromotionDecision],
) -> Result<CommitOutcome> {
    let source = find_class(db, class_id, "Class").await?;
    if let Some(target_id) = target_class_id {
        let target = find_class(db, target_id, "Target class").await?;
        if target.program_id != source.program_id {
            tracing::warn!(
                "Promoting class {} (program {}) into class {} of program {}",
                source.id,
                source.program_id,
                target.id,
                target.program_id
            );
        }
    }

    // Dropping the transaction without commit rolls everything back
    let txn = db.begin().await.map_err(ServerError::CommitFailed)?;
    let mut outcome = CommitOutcome::default();

    for decision in decisions {
        match apply_decision(&txn, &source, target_class_id, decision).await? {
            Some(reason) => {
                tracing::warn!(
                    "Skipping promotion of student {}: {:?}",
                    decision.student_id,
                    reason
                );
                outcome.skipped.push(SkippedStudent {
                    student_id: decision.student_id,
                    reason,
                });
            }
            None => outcome.committed_count += 1,
        }
    }

    txn.commit().await.map_err(ServerError::CommitFailed)?;

    tracing::info!(
        "Committed promotions for class {}: {} recorded, {} skipped",
        class_id,
        outcome.committed_count,
        outcome.skipped.len()
    );
    Ok(outcome)
}

/// Record one decision. `Ok(Some(reason))` means the student was left untouched.
async fn apply_decision(
    txn: &DatabaseTransaction,
    source: &class::Model,
    target_class_id: Option<i32>,
    decision: &PromotionDecision,
) -> Result<Option<SkipReason>> {
    let student = student::Entity::find_by_id(decision.student_id)
        .one(txn)
        .await
        .map_err(ServerError::CommitFailed)?
        .ok_or_else(|| ServerError::NotFound(format!("Student {}", decision.student_id)))?;

    if student.diproses_naik {
        return Ok(Some(SkipReason::AlreadyProcessed));
    }
    let Some(current_class_id) = student.class_id else {
        return Ok(Some(SkipReason::NoClass));
    };
    if current_class_id != source.id {
        return Err(ServerError::Forbidden);
    }
    if student.status != STATUS_ACTIVE {
        return Ok(Some(SkipReason::NotActive));
    }

    // Claim the student: only one commit may flip diproses_naik
    let claimed = student::Entity::update_many()
        .col_expr(student::Column::DiprosesNaik, Expr::value(true))
        .filter(student::Column::Id.eq(student.id))
        .filter(student::Column::DiprosesNaik.eq(false))
        .exec(txn)
        .await
        .map_err(ServerError::CommitFailed)?;
    if claimed.rows_affected == 0 {
        return Ok(Some(SkipReason::AlreadyProcessed));
    }

    let nilai_akhir = average_final_score(txn, student.id)
        .await
        .map_err(ServerError::CommitFailed)?;
    let now = now_unix();

    // Snapshot the class the decision was made in, before any reassignment
    student_class_history::ActiveModel {
        student_id: Set(student.id),
        class_id: Set(source.id),
        academic_year_id: Set(source.academic_year_id),
        naik_kelas: Set(decision.naik_kelas),
        nilai_akhir: Set(nilai_akhir),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(ServerError::CommitFailed)?;

    if decision.naik_kelas {
        if let Some(target_id) = target_class_id {
            student::Entity::update_many()
                .col_expr(student::Column::ClassId, Expr::value(target_id))
                .filter(student::Column::Id.eq(student.id))
                .exec(txn)
                .await
                .map_err(ServerError::CommitFailed)?;
        }
    }

    Ok(None)
}

async fn find_class(db: &DatabaseConnection, id: i32, what: &str) -> Result<class::Model> {
    class::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServerError::CommitFailed)?
        .ok_or_else(|| ServerError::NotFound(what.to_string()))
}
