use chrono::{DateTime, Utc};

/// How far a manual edit may move a recorded duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftPolicy {
    /// Baselines shorter than this are never drift-checked.
    pub min_checked_seconds: i64,
    /// Allowed drift as a fraction of the baseline.
    pub ratio: f64,
    /// Allowed drift in seconds when the fraction is smaller.
    pub floor_seconds: i64,
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self {
            min_checked_seconds: 60,
            ratio: 0.5,
            floor_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: Option<String>,
    pub duration_seconds: i64,
}

impl ValidationResult {
    fn accepted(duration_seconds: i64) -> Self {
        Self {
            valid: true,
            message: None,
            duration_seconds,
        }
    }

    fn rejected(message: String, duration_seconds: i64) -> Self {
        Self {
            valid: false,
            message: Some(message),
            duration_seconds,
        }
    }
}

pub fn validate_time_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    original_duration_seconds: i64,
    policy: &DriftPolicy,
) -> ValidationResult {
    let millis = (end - start).num_milliseconds();
    let new_duration = (millis as f64 / 1000.0).round() as i64;

    if new_duration <= 0 {
        return ValidationResult::rejected("End time must be after start time".to_string(), 0);
    }

    if original_duration_seconds < policy.min_checked_seconds {
        return ValidationResult::accepted(new_duration);
    }

    let diff = (new_duration - original_duration_seconds).abs();
    let max_diff = (original_duration_seconds as f64 * policy.ratio).max(policy.floor_seconds as f64);

    if diff as f64 > max_diff {
        let minutes = (diff as f64 / 60.0).round() as i64;
        return ValidationResult::rejected(
            format!("Duration change too large ({minutes}min)."),
            new_duration,
        );
    }

    ValidationResult::accepted(new_duration)
}
