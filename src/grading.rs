//! Grading — score cut points used on report cards.
//!
//! All cuts are inclusive lower bounds on a 0–100 percentage score. The
//! same table drives the letter grade and the grade point; term averages
//! use a coarser table for the performance band and teacher comment.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    #[must_use]
    pub fn grade_point(self) -> f64 {
        match self {
            Self::APlus => 4.0,
            Self::A => 3.5,
            Self::B => 3.0,
            Self::C => 2.5,
            Self::D => 2.0,
            Self::F => 1.0,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceBand {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Satisfactory,
    #[serde(rename = "Below Average")]
    BelowAverage,
}

impl PerformanceBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::VeryGood => "Very Good",
            Self::Good => "Good",
            Self::Satisfactory => "Satisfactory",
            Self::BelowAverage => "Below Average",
        }
    }
}

impl fmt::Display for PerformanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn letter_grade(score: f64) -> LetterGrade {
    match score {
        s if s >= 90.0 => LetterGrade::APlus,
        s if s >= 80.0 => LetterGrade::A,
        s if s >= 70.0 => LetterGrade::B,
        s if s >= 60.0 => LetterGrade::C,
        s if s >= 50.0 => LetterGrade::D,
        _ => LetterGrade::F,
    }
}

#[must_use]
pub fn grade_point(score: f64) -> f64 {
    letter_grade(score).grade_point()
}

#[must_use]
pub fn performance_band(average: f64) -> PerformanceBand {
    match average {
        a if a >= 80.0 => PerformanceBand::Excellent,
        a if a >= 70.0 => PerformanceBand::VeryGood,
        a if a >= 60.0 => PerformanceBand::Good,
        a if a >= 50.0 => PerformanceBand::Satisfactory,
        _ => PerformanceBand::BelowAverage,
    }
}

#[must_use]
pub fn teacher_comment(average: f64) -> &'static str {
    match average {
        a if a >= 80.0 => "Keep up the excellent work!",
        a if a >= 70.0 => "Good performance. Continue working hard.",
        a if a >= 60.0 => "Satisfactory performance. More effort needed.",
        _ => "Below expectations. Requires additional support.",
    }
}

// =============================================================================
// REPORT SUMMARY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectScore {
    pub subject: String,
    pub score: f64,
}

impl SubjectScore {
    pub fn new(subject: impl Into<String>, score: f64) -> Self {
        Self { subject: subject.into(), score }
    }

    #[must_use]
    pub fn grade(&self) -> LetterGrade {
        letter_grade(self.score)
    }
}

/// Term totals for one pupil.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total: f64,
    pub average: f64,
    pub overall_grade: LetterGrade,
    /// Mean grade point across subjects.
    pub gpa: f64,
    pub band: PerformanceBand,
    pub comment: &'static str,
}

impl ReportSummary {
    /// `None` when there are no scores to summarise.
    #[must_use]
    pub fn from_scores(scores: &[SubjectScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = scores.len() as f64;
        let total: f64 = scores.iter().map(|s| s.score).sum();
        let points: f64 = scores.iter().map(|s| grade_point(s.score)).sum();
        let average = total / count;
        Some(Self {
            total,
            average,
            overall_grade: letter_grade(average),
            gpa: points / count,
            band: performance_band(average),
            comment: teacher_comment(average),
        })
    }
}

#[cfg(test)]
#[path = "grading_test.rs"]
mod tests;
