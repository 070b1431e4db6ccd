//! Answer checking and score keeping.
//!
//! Numeric answers are accepted within a tolerance band around the value the
//! model produced, `|measured - actual| <= tolerance`, with the band given
//! absolutely or relative to the true value. Choice answers must match the
//! correct option exactly.
//!
//! Points are either fixed or fall off linearly with the deviation inside
//! the band: an exact answer earns the maximum, an answer on the edge of the
//! band earns half. Wrong answers are still recorded, with zero points. The
//! [`ScoreRecord`] only ever grows until it is cleared by a reset.

use serde::{Deserialize, Serialize};

use crate::catalog;

/// Shown for answers inside the band that are not exact enough for full marks.
pub const PARTIAL_FEEDBACK: &str = "Within tolerance, but a more careful reading gets full marks.";

/// Acceptance band of a numeric answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    Absolute(f64),
    /// Fraction of the true value
    Relative(f64),
}

impl Tolerance {
    /// Half width of the band around `actual`.
    pub fn band(&self, actual: f64) -> f64 {
        match *self {
            Tolerance::Absolute(width) => width.abs(),
            Tolerance::Relative(fraction) => (fraction * actual).abs(),
        }
    }

    /// Whether `measured` lies inside the band around `actual`.
    pub fn accepts(&self, measured: f64, actual: f64) -> bool {
        measured.is_finite() && (measured - actual).abs() <= self.band(actual)
    }
}

/// A learner's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Numeric(f64),
    Choice(String),
}

/// Answer to one declared question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub question: String,
    pub answer: Answer,
}

impl Submission {
    pub fn numeric(question: &str, value: f64) -> Self {
        Submission { question: question.to_string(), answer: Answer::Numeric(value) }
    }

    pub fn choice(question: &str, option: &str) -> Self {
        Submission { question: question.to_string(), answer: Answer::Choice(option.to_string()) }
    }
}

/// How many points a question is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Points {
    Fixed(u32),
    /// Linear falloff with the deviation, from `max` down to `max / 2`
    Scaled { max: u32 },
}

impl Points {
    pub fn max(&self) -> u32 {
        match *self {
            Points::Fixed(points) | Points::Scaled { max: points } => points,
        }
    }
}

/// Outcome of checking one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckResult {
    pub correct: bool,
    pub points: u32,
    pub max_points: u32,
    /// `|measured - actual|` for numeric answers
    pub deviation: Option<f64>,
}

impl CheckResult {
    pub fn is_full_marks(&self) -> bool {
        self.correct && self.points == self.max_points
    }
}

/// Checks a numeric answer.
pub fn check_numeric(
    measured: f64,
    actual: f64,
    tolerance: Tolerance,
    points: Points,
) -> CheckResult {
    let deviation = (measured - actual).abs();
    let correct = tolerance.accepts(measured, actual);
    let earned = match (correct, points) {
        (false, _) => 0,
        (true, Points::Fixed(p)) => p,
        (true, Points::Scaled { max }) => {
            let band = tolerance.band(actual);
            let share = if band > 0.0 { 1.0 - 0.5 * (deviation / band).min(1.0) } else { 1.0 };
            (max as f64 * share).round() as u32
        }
    };
    CheckResult { correct, points: earned, max_points: points.max(), deviation: Some(deviation) }
}

/// Checks a choice answer against the single correct option.
pub fn check_choice(chosen: &str, correct: &str, points: Points) -> CheckResult {
    check_condition(chosen == correct, points)
}

/// Scores a condition that has already been decided.
pub fn check_condition(correct: bool, points: Points) -> CheckResult {
    let max_points = points.max();
    let earned = if correct { max_points } else { 0 };
    CheckResult { correct, points: earned, max_points, deviation: None }
}

/// Feedback line for a checked answer.
///
/// Depends only on the result and the experiment.
pub fn feedback(result: &CheckResult, experiment_id: &str) -> &'static str {
    let texts =
        catalog::find(experiment_id).map(|d| d.feedback).unwrap_or(catalog::GENERIC_FEEDBACK);
    if result.is_full_marks() {
        texts.correct
    } else if result.correct {
        PARTIAL_FEEDBACK
    } else {
        texts.incorrect
    }
}

/// One scored answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub label: String,
    pub points: u32,
    pub correct: bool,
}

/// Points collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreRecord {
    total: u32,
    entries: Vec<ScoreEntry>,
}

impl ScoreRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all entry points.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the result of one check.
    pub fn record(&mut self, label: &str, result: &CheckResult) {
        self.total += result.points;
        self.entries.push(ScoreEntry {
            label: label.to_string(),
            points: result.points,
            correct: result.correct,
        });
    }

    pub(crate) fn clear(&mut self) {
        self.total = 0;
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_tolerance() {
        let tol = Tolerance::Absolute(0.2);
        assert!(tol.accepts(12.6, 12.5));
        assert!(tol.accepts(12.3, 12.5));
        assert!(!tol.accepts(12.8, 12.5));
        assert!(!tol.accepts(f64::NAN, 12.5));
    }

    #[test]
    fn test_relative_tolerance() {
        let tol = Tolerance::Relative(0.05);
        assert!(tol.accepts(104.0, 100.0));
        assert!(!tol.accepts(106.0, 100.0));
        assert!((tol.band(-20.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scaled_points_fall_off() {
        let tol = Tolerance::Absolute(1.0);
        let exact = check_numeric(10.0, 10.0, tol, Points::Scaled { max: 100 });
        assert_eq!(exact.points, 100);
        assert!(exact.is_full_marks());

        let edge = check_numeric(11.0, 10.0, tol, Points::Scaled { max: 100 });
        assert!(edge.correct);
        assert_eq!(edge.points, 50);

        let wrong = check_numeric(12.0, 10.0, tol, Points::Scaled { max: 100 });
        assert!(!wrong.correct);
        assert_eq!(wrong.points, 0);
        assert_eq!(wrong.max_points, 100);
    }

    #[test]
    fn test_choice_must_match_exactly() {
        assert!(check_choice("nacl_h2o", "nacl_h2o", Points::Fixed(20)).correct);
        assert!(!check_choice("NaCl_H2O", "nacl_h2o", Points::Fixed(20)).correct);
    }

    #[test]
    fn test_record_total_is_sum() {
        let mut record = ScoreRecord::new();
        record.record("reagents", &check_condition(true, Points::Fixed(50)));
        record.record("indicator", &check_condition(false, Points::Fixed(30)));
        record.record("product", &check_choice("nacl_h2o", "nacl_h2o", Points::Fixed(20)));

        assert_eq!(record.total(), 70);
        assert_eq!(record.len(), 3);
        assert_eq!(record.total(), record.entries().iter().map(|e| e.points).sum::<u32>());
        assert!(!record.entries()[1].correct);

        record.clear();
        assert_eq!(record.total(), 0);
        assert!(record.is_empty());
    }

    #[test]
    fn test_feedback_is_pure() {
        let right = check_condition(true, Points::Fixed(10));
        let wrong = check_condition(false, Points::Fixed(10));
        assert_eq!(feedback(&right, "projectile"), feedback(&right, "projectile"));
        assert_ne!(feedback(&right, "projectile"), feedback(&wrong, "projectile"));
        assert_eq!(feedback(&right, "no_such_lab"), catalog::GENERIC_FEEDBACK.correct);

        let partial =
            check_numeric(10.5, 10.0, Tolerance::Absolute(1.0), Points::Scaled { max: 10 });
        assert_eq!(feedback(&partial, "projectile"), PARTIAL_FEEDBACK);
    }
}
