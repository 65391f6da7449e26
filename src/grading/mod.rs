// src/grading/mod.rs
//
// Pure grading rules. Nothing in here touches the database.

pub mod access;
pub mod aggregate;
pub mod checklist;
pub mod option;
pub mod quiz;
