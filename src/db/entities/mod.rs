//! Database entities

pub mod academic_year;
pub mod attendance;
pub mod class;
pub mod final_score;
pub mod session;
pub mod student;
pub mod student_class_history;
pub mod tutor;
pub mod user;

pub use academic_year::Entity as AcademicYear;
pub use attendance::Entity as Attendance;
pub use class::Entity as Class;
pub use final_score::Entity as FinalScore;
pub use session::Entity as Session;
pub use student::Entity as Student;
pub use student_class_history::Entity as StudentClassHistory;
pub use tutor::Entity as Tutor;
pub use user::Entity as User;
