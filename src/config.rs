// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Default ratio a quiz needs (`total / max`) when an author omits one.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.5;

/// Default final-exam mark (0..=100) needed to pass.
pub const DEFAULT_FINAL_PASS_MARK: f64 = 60.0;

/// Tolerance used when checking that partial weights sum to 1.
pub const DEFAULT_WEIGHT_EPSILON: f64 = 1e-6;

pub const DEFAULT_EXAM_CODE_LENGTH: usize = 6;

/// How many candidate codes are drawn before giving up on a class.
pub const MAX_CODE_GENERATION_ATTEMPTS: usize = 32;

/// What to do with a submitted question id that is not part of the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownQuestionPolicy {
    #[default]
    Ignore,
    Reject,
}

impl FromStr for UnknownQuestionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown question policy '{}'", other)),
        }
    }
}

/// Knobs consulted by the graders. Cheap to copy into every call.
#[derive(Debug, Clone, Copy)]
pub struct GradingPolicy {
    pub final_pass_mark: f64,
    pub weight_epsilon: f64,
    pub exam_code_length: usize,
    pub unknown_questions: UnknownQuestionPolicy,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            final_pass_mark: DEFAULT_FINAL_PASS_MARK,
            weight_epsilon: DEFAULT_WEIGHT_EPSILON,
            exam_code_length: DEFAULT_EXAM_CODE_LENGTH,
            unknown_questions: UnknownQuestionPolicy::Ignore,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub listen_addr: String,
    pub grading: GradingPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://assessment.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = parse_or("JWT_EXPIRATION", 3600);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let listen_addr = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let grading = GradingPolicy {
            final_pass_mark: parse_or("FINAL_PASS_MARK", DEFAULT_FINAL_PASS_MARK),
            weight_epsilon: parse_or("WEIGHT_EPSILON", DEFAULT_WEIGHT_EPSILON),
            exam_code_length: parse_or("EXAM_CODE_LENGTH", DEFAULT_EXAM_CODE_LENGTH),
            unknown_questions: parse_or("UNKNOWN_QUESTION_POLICY", UnknownQuestionPolicy::Ignore),
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            listen_addr,
            grading,
        }
    }
}

/// Reads and parses an env var, falling back to `default` when unset.
/// A value that is set but unparsable is a startup error.
fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => default,
    }
}
