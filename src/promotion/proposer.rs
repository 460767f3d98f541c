//! Promotion proposal scoring.
//!
//! Read-only: averages final scores and tallies attendance so a reviewer can
//! decide. Either every student in the request is scored or the call fails
//! with `AggregationFailure`.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use super::{AttendanceStatus, STATUS_ACTIVE};
use crate::db::entities::{attendance, class, final_score, student};
use crate::error::{Result, ServerError};

/// Attendance counts for one student in one class and academic year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    #[serde(rename = "hadir")]
    pub present: u32,
    #[serde(rename = "sakit")]
    pub sick: u32,
    #[serde(rename = "izin")]
    pub excused: u32,
    #[serde(rename = "alpa")]
    pub absent: u32,
    /// `present / total * 100`, 0 when there are no records
    #[serde(rename = "persen")]
    pub percentage: f64,
}

impl AttendanceSummary {
    /// Tally raw status strings. Unknown statuses are ignored.
    pub fn tally<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = Self::default();
        for raw in statuses {
            match AttendanceStatus::parse(raw) {
                Some(AttendanceStatus::Present) => summary.present += 1,
                Some(AttendanceStatus::Sick) => summary.sick += 1,
                Some(AttendanceStatus::Excused) => summary.excused += 1,
                Some(AttendanceStatus::Absent) => summary.absent += 1,
                None => tracing::warn!("Ignoring unknown attendance status {:?}", raw),
            }
        }

        let total = summary.total();
        if total > 0 {
            summary.percentage = summary.present as f64 / total as f64 * 100.0;
        }
        summary
    }

    pub fn total(&self) -> u32 {
        self.present + self.sick + self.excused + self.absent
    }
}

/// Scores for one student, as shown to the reviewer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProposal {
    pub student_id: i32,
    pub average_final_score: f64,
    pub attendance_percentage: f64,
    /// Mirrors `students.naik_kelas`
    pub currently_proposed: bool,
    pub attendance: AttendanceSummary,
}

/// Arithmetic mean; a student without final scores averages 0
pub fn mean_score(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Average of every final score the student has, across subjects
pub async fn average_final_score<C: ConnectionTrait>(
    db: &C,
    student_id: i32,
) -> std::result::Result<f64, DbErr> {
    let scores: Vec<f64> = final_score::Entity::find()
        .filter(final_score::Column::StudentId.eq(student_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.score)
        .collect();
    Ok(mean_score(&scores))
}

/// Score every active student of `class_id`
pub async fn compute_proposals<C: ConnectionTrait>(
    db: &C,
    class_id: i32,
) -> Result<Vec<StudentProposal>> {
    let class = class::Entity::find_by_id(class_id)
        .one(db)
        .await
        .map_err(ServerError::AggregationFailure)?
        .ok_or_else(|| ServerError::NotFound("Class".to_string()))?;

    let students = student::Entity::find()
        .filter(student::Column::ClassId.eq(class.id))
        .filter(student::Column::Status.eq(STATUS_ACTIVE))
        .order_by_asc(student::Column::Name)
        .all(db)
        .await
        .map_err(ServerError::AggregationFailure)?;

    let years = HashMap::from([(class.id, class.academic_year_id)]);
    aggregate(db, &students, &years)
        .await
        .map_err(ServerError::AggregationFailure)
}

/// The review queue: active students proposed for promotion but not yet processed
pub async fn list_pending_proposals<C: ConnectionTrait>(
    db: &C,
    class_filter: Option<i32>,
) -> Result<Vec<(student::Model, StudentProposal)>> {
    let mut query = student::Entity::find()
        .filter(student::Column::Status.eq(STATUS_ACTIVE))
        .filter(student::Column::NaikKelas.eq(true))
        .filter(student::Column::DiprosesNaik.eq(false));
    if let Some(class_id) = class_filter {
        query = query.filter(student::Column::ClassId.eq(class_id));
    }
    let students = query
        .order_by_asc(student::Column::ClassId)
        .order_by_asc(student::Column::Name)
        .all(db)
        .await
        .map_err(ServerError::AggregationFailure)?;

    let class_ids: Vec<i32> = students.iter().filter_map(|s| s.class_id).collect();
    let years: HashMap<i32, i32> = if class_ids.is_empty() {
        HashMap::new()
    } else {
        class::Entity::find()
            .filter(class::Column::Id.is_in(class_ids))
            .all(db)
            .await
            .map_err(ServerError::AggregationFailure)?
            .into_iter()
            .map(|c| (c.id, c.academic_year_id))
            .collect()
    };

    let proposals = aggregate(db, &students, &years)
        .await
        .map_err(ServerError::AggregationFailure)?;
    Ok(students.into_iter().zip(proposals).collect())
}

/// Score `students`; `years` maps class id to its academic year.
/// Attendance only counts rows in the student's current class and that year.
async fn aggregate<C: ConnectionTrait>(
    db: &C,
    students: &[student::Model],
    years: &HashMap<i32, i32>,
) -> std::result::Result<Vec<StudentProposal>, DbErr> {
    if students.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = students.iter().map(|s| s.id).collect();

    let mut scores: HashMap<i32, Vec<f64>> = HashMap::new();
    for row in final_score::Entity::find()
        .filter(final_score::Column::StudentId.is_in(ids.clone()))
        .all(db)
        .await?
    {
        scores.entry(row.student_id).or_default().push(row.score);
    }

    // (student, class, year) -> statuses
    let mut statuses: HashMap<(i32, i32, i32), Vec<String>> = HashMap::new();
    for row in attendance::Entity::find()
        .filter(attendance::Column::StudentId.is_in(ids))
        .all(db)
        .await?
    {
        statuses
            .entry((row.student_id, row.class_id, row.academic_year_id))
            .or_default()
            .push(row.status);
    }

    Ok(students
        .iter()
        .map(|s| {
            let average = mean_score(scores.get(&s.id).map(Vec::as_slice).unwrap_or(&[]));
            let scope = s
                .class_id
                .and_then(|class_id| years.get(&class_id).map(|year_id| (s.id, class_id, *year_id)));
            let attendance = scope
                .and_then(|key| statuses.get(&key))
                .map(|rows| AttendanceSummary::tally(rows.iter().map(String::as_str)))
                .unwrap_or_default();

            StudentProposal {
                student_id: s.id,
                average_final_score: average,
                attendance_percentage: attendance.percentage,
                currently_proposed: s.naik_kelas,
                attendance,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::*;

    #[test]
    fn test_mean_score() {
        assert_eq!(mean_score(&[70.0, 80.0, 90.0]), 80.0);
        assert_eq!(mean_score(&[]), 0.0);
        assert_eq!(mean_score(&[85.5]), 85.5);
    }

    #[test]
    fn test_attendance_tally() {
        let summary = AttendanceSummary::tally(["PRESENT", "PRESENT", "SICK", "ABSENT"]);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.sick, 1);
        assert_eq!(summary.excused, 0);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.percentage, 50.0);
    }

    #[test]
    fn test_attendance_tally_empty_is_zero() {
        let summary = AttendanceSummary::tally(std::iter::empty());
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.percentage, 0.0);
    }

    #[test]
    fn test_attendance_percentage_bounds() {
        let all_present = AttendanceSummary::tally(["PRESENT"; 12]);
        assert_eq!(all_present.percentage, 100.0);
        let none_present = AttendanceSummary::tally(["ABSENT", "EXCUSED", "SICK"]);
        assert_eq!(none_present.percentage, 0.0);

        let mixed = AttendanceSummary::tally(["PRESENT", "EXCUSED", "PRESENT"]);
        assert!((0.0..=100.0).contains(&mixed.percentage));
    }

    #[test]
    fn test_attendance_tally_ignores_unknown() {
        let summary = AttendanceSummary::tally(["PRESENT", "LATE"]);
        assert_eq!(summary.total(), 1);
        assert_eq!(summary.percentage, 100.0);
    }

    #[test]
    fn test_summary_wire_names() {
        let json = serde_json::to_value(AttendanceSummary::tally(["PRESENT", "ABSENT"])).unwrap();
        assert_eq!(json["hadir"], 1);
        assert_eq!(json["alpa"], 1);
        assert_eq!(json["sakit"], 0);
        assert_eq!(json["izin"], 0);
        assert_eq!(json["persen"], 50.0);
    }

    #[tokio::test]
    async fn test_compute_proposals() {
        let (_dir, db) = test_db().await;
        let year = insert_year(&db, 2024, true).await;
        let class = insert_class(&db, "XI-A", year.id, None).await;
        let budi = insert_student(&db, "Budi", Some(class.id)).await;
        let citra = insert_student(&db, "Citra", Some(class.id)).await;
        set_student_flags(&db, &citra, "ACTIVE", true).await;

        insert_scores(&db, budi.id, year.id, &[70.0, 80.0, 90.0]).await;
        insert_attendance(&db, budi.id, class.id, year.id, &["PRESENT", "PRESENT", "SICK", "ABSENT"])
            .await;

        let proposals = compute_proposals(&db, class.id).await.unwrap();
        assert_eq!(proposals.len(), 2);

        let p_budi = proposals.iter().find(|p| p.student_id == budi.id).unwrap();
        assert_eq!(p_budi.average_final_score, 80.0);
        assert_eq!(p_budi.attendance_percentage, 50.0);
        assert!(!p_budi.currently_proposed);

        // No grades and no attendance: zeros, not NaN
        let p_citra = proposals.iter().find(|p| p.student_id == citra.id).unwrap();
        assert_eq!(p_citra.average_final_score, 0.0);
        assert_eq!(p_citra.attendance_percentage, 0.0);
        assert!(p_citra.currently_proposed);
    }

    #[tokio::test]
    async fn test_attendance_scoped_to_class_and_year() {
        let (_dir, db) = test_db().await;
        let old_year = insert_year(&db, 2023, false).await;
        let year = insert_year(&db, 2024, true).await;
        let old_class = insert_class(&db, "X-A", old_year.id, None).await;
        let class = insert_class(&db, "XI-A", year.id, None).await;
        let budi = insert_student(&db, "Budi", Some(class.id)).await;

        insert_attendance(&db, budi.id, old_class.id, old_year.id, &["ABSENT", "ABSENT"]).await;
        insert_attendance(&db, budi.id, class.id, year.id, &["PRESENT"]).await;

        let proposals = compute_proposals(&db, class.id).await.unwrap();
        assert_eq!(proposals[0].attendance.total(), 1);
        assert_eq!(proposals[0].attendance_percentage, 100.0);
    }

    #[tokio::test]
    async fn test_compute_proposals_unknown_class() {
        let (_dir, db) = test_db().await;
        assert!(matches!(
            compute_proposals(&db, 42).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_queue() {
        let (_dir, db) = test_db().await;
        let year = insert_year(&db, 2024, true).await;
        let class_a = insert_class(&db, "XI-A", year.id, None).await;
        let class_b = insert_class(&db, "XI-B", year.id, None).await;

        let proposed = insert_student(&db, "Ani", Some(class_a.id)).await;
        let proposed = set_student_flags(&db, &proposed, "ACTIVE", true).await;
        let other = insert_student(&db, "Bayu", Some(class_b.id)).await;
        set_student_flags(&db, &other, "ACTIVE", true).await;
        insert_student(&db, "NotProposed", Some(class_a.id)).await;
        let inactive = insert_student(&db, "Gone", Some(class_a.id)).await;
        set_student_flags(&db, &inactive, "INACTIVE", true).await;

        insert_scores(&db, proposed.id, year.id, &[60.0, 80.0]).await;

        let all = list_pending_proposals(&db, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_a = list_pending_proposals(&db, Some(class_a.id)).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].0.id, proposed.id);
        assert_eq!(only_a[0].1.average_final_score, 70.0);
    }
}
