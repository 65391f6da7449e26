// src/store/mod.rs
//
// Datastore access on top of the SQLite pool. Each module owns one aggregate.

pub mod attempts;
pub mod enrollments;
pub mod exam_access;
pub mod final_exams;
pub mod practice;
pub mod quizzes;
