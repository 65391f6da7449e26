// src/models/mod.rs

pub mod attempt;
pub mod enrollment;
pub mod final_exam;
pub mod practice;
pub mod quiz;
