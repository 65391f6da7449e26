// src/handlers/mod.rs

pub mod admin;
pub mod final_exam;
pub mod practice;
pub mod quiz;
