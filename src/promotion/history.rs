//! Student class history reads and corrections.
//!
//! History rows are never deleted. A correction may only touch the recorded
//! decision and final score.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::entities::student_class_history;
use crate::db::now_unix;
use crate::error::{Result, ServerError};

/// Fields a correction may change
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryCorrection {
    pub naik_kelas: Option<bool>,
    pub nilai_akhir: Option<f64>,
}

impl HistoryCorrection {
    fn validate(&self) -> Result<()> {
        if self.naik_kelas.is_none() && self.nilai_akhir.is_none() {
            return Err(ServerError::Validation(
                "naikKelas or nilaiAkhir is required".to_string(),
            ));
        }
        if let Some(score) = self.nilai_akhir {
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return Err(ServerError::Validation(
                    "nilaiAkhir must be between 0 and 100".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// All history rows of a student, newest first
pub async fn list_history<C: ConnectionTrait>(
    db: &C,
    student_id: i32,
) -> Result<Vec<student_class_history::Model>> {
    Ok(student_class_history::Entity::find()
        .filter(student_class_history::Column::StudentId.eq(student_id))
        .order_by_desc(student_class_history::Column::CreatedAt)
        .order_by_desc(student_class_history::Column::Id)
        .all(db)
        .await?)
}

pub async fn correct_history<C: ConnectionTrait>(
    db: &C,
    history_id: i32,
    correction: HistoryCorrection,
) -> Result<student_class_history::Model> {
    correction.validate()?;

    let row = student_class_history::Entity::find_by_id(history_id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::NotFound("Class history".to_string()))?;

    let mut active: student_class_history::ActiveModel = row.into();
    if let Some(naik_kelas) = correction.naik_kelas {
        active.naik_kelas = Set(naik_kelas);
    }
    if let Some(nilai_akhir) = correction.nilai_akhir {
        active.nilai_akhir = Set(nilai_akhir);
    }
    active.updated_at = Set(now_unix());

    let updated = active.update(db).await?;
    tracing::info!("Corrected class history {}", history_id);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::*;
    use crate::promotion::{PromotionCommitter, PromotionDecision};

    #[test]
    fn test_correction_validation() {
        assert!(HistoryCorrection::default().validate().is_err());
        assert!(HistoryCorrection { nilai_akhir: Some(101.0), ..Default::default() }
            .validate()
            .is_err());
        assert!(HistoryCorrection { nilai_akhir: Some(f64::NAN), ..Default::default() }
            .validate()
            .is_err());
        assert!(HistoryCorrection { naik_kelas: Some(false), ..Default::default() }
            .validate()
            .is_ok());
    }

    #[tokio::test]
    async fn test_correct_only_touches_decision_and_score() {
        let (_dir, db) = test_db().await;
        let year = insert_year(&db, 2024, true).await;
        let class = insert_class(&db, "XI-A", year.id, None).await;
        let ani = insert_student(&db, "Ani", Some(class.id)).await;

        PromotionCommitter::default()
            .commit(
                &db,
                class.id,
                None,
                &[PromotionDecision { student_id: ani.id, naik_kelas: false }],
            )
            .await
            .unwrap();

        let rows = list_history(&db, ani.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        let original = rows[0].clone();

        let corrected = correct_history(
            &db,
            original.id,
            HistoryCorrection { naik_kelas: Some(true), nilai_akhir: Some(75.5) },
        )
        .await
        .unwrap();

        assert!(corrected.naik_kelas);
        assert_eq!(corrected.nilai_akhir, 75.5);
        assert_eq!(corrected.student_id, original.student_id);
        assert_eq!(corrected.class_id, original.class_id);
        assert_eq!(corrected.academic_year_id, original.academic_year_id);
        assert_eq!(corrected.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_correct_missing_row() {
        let (_dir, db) = test_db().await;
        let err = correct_history(
            &db,
            5,
            HistoryCorrection { naik_kelas: Some(true), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
