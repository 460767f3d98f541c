//! Seed helpers for tests backed by a throwaway SQLite file.

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tempfile::TempDir;

use super::entities::{academic_year, attendance, class, final_score, student, tutor, user};
use super::{init_database, now_unix};

/// Fresh database in a temp dir; keep the `TempDir` alive for the test's duration
pub async fn test_db() -> (TempDir, DatabaseConnection) {
    let temp_dir = TempDir::new().unwrap();
    let db = init_database(&temp_dir.path().join("test.db")).await.unwrap();
    (temp_dir, db)
}

pub async fn insert_year(
    db: &DatabaseConnection,
    start_year: i32,
    is_active: bool,
) -> academic_year::Model {
    academic_year::ActiveModel {
        start_year: Set(start_year),
        end_year: Set(start_year + 1),
        semester: Set("EVEN".to_string()),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Tutor plus its backing user row
pub async fn insert_tutor(db: &DatabaseConnection, username: &str) -> tutor::Model {
    let user = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(String::new()),
        role: Set("TUTOR".to_string()),
        created_at: Set(now_unix()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    tutor::ActiveModel {
        user_id: Set(user.id),
        name: Set(username.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_class(
    db: &DatabaseConnection,
    name: &str,
    year_id: i32,
    homeroom_teacher_id: Option<i32>,
) -> class::Model {
    class::ActiveModel {
        name: Set(name.to_string()),
        program_id: Set(1),
        academic_year_id: Set(year_id),
        homeroom_teacher_id: Set(homeroom_teacher_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_student(
    db: &DatabaseConnection,
    name: &str,
    class_id: Option<i32>,
) -> student::Model {
    student::ActiveModel {
        user_id: Set(None),
        name: Set(name.to_string()),
        nis: Set(format!("NIS-{}", name)),
        class_id: Set(class_id),
        status: Set("ACTIVE".to_string()),
        naik_kelas: Set(false),
        diproses_naik: Set(false),
        created_at: Set(now_unix()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn set_student_flags(
    db: &DatabaseConnection,
    student: &student::Model,
    status: &str,
    naik_kelas: bool,
) -> student::Model {
    let mut active: student::ActiveModel = student.clone().into();
    active.status = Set(status.to_string());
    active.naik_kelas = Set(naik_kelas);
    active.update(db).await.unwrap()
}

/// One final score per entry, each for a distinct subject
pub async fn insert_scores(db: &DatabaseConnection, student_id: i32, year_id: i32, scores: &[f64]) {
    for (subject, score) in scores.iter().enumerate() {
        final_score::ActiveModel {
            student_id: Set(student_id),
            subject_id: Set(subject as i32 + 1),
            academic_year_id: Set(year_id),
            score: Set(*score),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }
}

/// One attendance row per status, on consecutive days
pub async fn insert_attendance(
    db: &DatabaseConnection,
    student_id: i32,
    class_id: i32,
    year_id: i32,
    statuses: &[&str],
) {
    for (day, status) in statuses.iter().enumerate() {
        attendance::ActiveModel {
            student_id: Set(student_id),
            class_id: Set(class_id),
            academic_year_id: Set(year_id),
            date: Set(format!("2024-08-{:02}", day + 1)),
            status: Set(status.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }
}
