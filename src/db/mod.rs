//! Database module for SQLite persistence using SeaORM

pub mod entities;
#[cfg(test)]
pub mod testing;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;

/// Initialize database connection and create tables
pub async fn init_database(db_path: &Path) -> Result<DatabaseConnection, DbErr> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    tracing::info!("Connecting to database: {}", db_url);

    let db = Database::connect(&db_url).await?;

    create_tables(&db).await?;

    Ok(db)
}

/// Schema, in dependency order. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    // Accounts. role is one of ADMIN, TUTOR, STUDENT
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    // Login sessions; only the SHA-256 of the cookie token is stored
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        token_hash TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)"#,
    r#"
    CREATE TABLE IF NOT EXISTS tutors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE,
        name TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS academic_years (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_year INTEGER NOT NULL,
        end_year INTEGER NOT NULL,
        semester TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        program_id INTEGER NOT NULL,
        academic_year_id INTEGER NOT NULL,
        homeroom_teacher_id INTEGER,
        FOREIGN KEY (academic_year_id) REFERENCES academic_years(id),
        FOREIGN KEY (homeroom_teacher_id) REFERENCES tutors(id) ON DELETE SET NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_classes_homeroom ON classes(homeroom_teacher_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_classes_year ON classes(academic_year_id)"#,
    // status is one of ACTIVE, INACTIVE, GRADUATED
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        name TEXT NOT NULL,
        nis TEXT NOT NULL,
        class_id INTEGER,
        status TEXT NOT NULL DEFAULT 'ACTIVE',
        naik_kelas INTEGER NOT NULL DEFAULT 0,
        diproses_naik INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL,
        FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE SET NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)"#,
    r#"
    CREATE TABLE IF NOT EXISTS final_scores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        subject_id INTEGER NOT NULL,
        academic_year_id INTEGER NOT NULL,
        score REAL NOT NULL,
        FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
        FOREIGN KEY (academic_year_id) REFERENCES academic_years(id),
        UNIQUE(student_id, subject_id, academic_year_id)
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_final_scores_student ON final_scores(student_id)"#,
    // status is one of PRESENT, SICK, EXCUSED, ABSENT
    r#"
    CREATE TABLE IF NOT EXISTS attendances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        class_id INTEGER NOT NULL,
        academic_year_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL,
        FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
        FOREIGN KEY (class_id) REFERENCES classes(id),
        FOREIGN KEY (academic_year_id) REFERENCES academic_years(id)
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_attendances_student ON attendances(student_id, class_id, academic_year_id)"#,
    // Append-only promotion snapshots. No ON DELETE CASCADE: history outlives its student
    r#"
    CREATE TABLE IF NOT EXISTS student_class_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        class_id INTEGER NOT NULL,
        academic_year_id INTEGER NOT NULL,
        naik_kelas INTEGER NOT NULL,
        nilai_akhir REAL NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_class_history_student ON student_class_history(student_id)"#,
];

/// Create all tables if they don't exist
async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    for sql in SCHEMA {
        db.execute(Statement::from_string(backend, sql.to_string()))
            .await?;
    }

    tracing::info!("Database tables initialized");
    Ok(())
}

/// Current Unix time in seconds
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
