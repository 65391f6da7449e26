// src/grading/access.rs

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Upper-case letters and digits without the look-alikes 0/O and 1/I.
pub const EXAM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Why the exam gate refused a request. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    UnknownPartial,
    NotTheory,
    NotOwner,
    NoCodeIssued,
    CodeMismatch,
    OutsideWindow,
    NotStarted,
    AlreadySubmitted,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::UnknownPartial => "partial does not exist",
            Self::NotTheory => "partial is not a theory exam",
            Self::NotOwner => "requester does not own the exam",
            Self::NoCodeIssued => "no exam code issued",
            Self::CodeMismatch => "exam code mismatch",
            Self::OutsideWindow => "outside the exam window",
            Self::NotStarted => "theory exam was not started",
            Self::AlreadySubmitted => "theory exam already submitted",
        };
        f.write_str(reason)
    }
}

/// Draws one code of `len` characters from [`EXAM_CODE_ALPHABET`].
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| EXAM_CODE_ALPHABET[rng.gen_range(0..EXAM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Draws codes until one is not `taken`, giving up after `max_attempts`.
pub fn generate_unique_code<R, F>(
    rng: &mut R,
    len: usize,
    max_attempts: usize,
    mut taken: F,
) -> Option<String>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> bool,
{
    for _ in 0..max_attempts {
        let code = generate_code(rng, len);
        if !taken(&code) {
            return Some(code);
        }
        tracing::debug!("Exam code collision, drawing again");
    }
    None
}

/// Whether `now` lies inside `[start, end]`. The window only applies when
/// both ends are set.
pub fn within_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => start <= now && now <= end,
        _ => true,
    }
}

/// Whether a code still counts against uniqueness: its window has not closed.
pub fn is_code_active(end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    end.is_none_or(|end| now <= end)
}

/// Facts about a Theory partial needed to decide on access.
#[derive(Debug, Clone)]
pub struct TheoryGate<'a> {
    pub kind_is_theory: bool,
    pub owner_learner_id: i64,
    pub exam_code: Option<&'a str>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub already_submitted: bool,
}

/// Runs every gate check. Callers map any error to one uniform denial.
pub fn check_theory_access(
    gate: &TheoryGate<'_>,
    supplied_code: &str,
    requester_id: i64,
    now: DateTime<Utc>,
) -> Result<(), DenialReason> {
    if !gate.kind_is_theory {
        return Err(DenialReason::NotTheory);
    }
    if gate.owner_learner_id != requester_id {
        return Err(DenialReason::NotOwner);
    }
    let Some(expected) = gate.exam_code else {
        return Err(DenialReason::NoCodeIssued);
    };
    if !codes_match(expected, supplied_code) {
        return Err(DenialReason::CodeMismatch);
    }
    if !within_window(gate.start_time, gate.end_time, now) {
        return Err(DenialReason::OutsideWindow);
    }
    if gate.already_submitted {
        return Err(DenialReason::AlreadySubmitted);
    }
    Ok(())
}

/// Exact byte comparison that does not stop at the first differing byte.
fn codes_match(expected: &str, supplied: &str) -> bool {
    let expected = expected.as_bytes();
    let supplied = supplied.as_bytes();
    if expected.len() != supplied.len() {
        return false;
    }
    expected.iter().zip(supplied).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
