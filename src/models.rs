use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;

/// Term key used for sessions recorded without a term.
pub const UNKNOWN_TERM: &str = "N/A";

pub const CRITICAL_COLOR: &str = "#cc1313";
pub const WARNING_COLOR: &str = "#ff9800";
pub const POSITIVE_COLOR: &str = "#4caf50";

/// One tutoring or advising session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub reason: String,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default, deserialize_with = "empty_date_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub follow_up: String,
}

impl Session {
    pub fn new(reason: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            term: Some(term.into()),
            date: None,
            description: String::new(),
            follow_up: String::new(),
        }
    }

    pub fn term_key(&self) -> &str {
        self.term.as_deref().unwrap_or(UNKNOWN_TERM)
    }
}

fn empty_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Sort value of a term key: its number when made of digits only, 0 otherwise.
/// Digit strings too long for a `u64` saturate so they still sort as newest.
pub fn term_sort_value(term: &str) -> u64 {
    if !term.is_empty() && term.chars().all(|c| c.is_ascii_digit()) {
        term.parse().unwrap_or(u64::MAX)
    } else {
        0
    }
}

/// Identity of a student. Only echoed into evaluations, never scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentInfo {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub paternal_surname: Option<String>,
    #[serde(default)]
    pub maternal_surname: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
}

/// Everything needed to evaluate one student. The incident counts are
/// computed by the caller, not derived from the sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInput {
    #[serde(default)]
    pub info: StudentInfo,
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub absences: usize,
    #[serde(default)]
    pub low_grade_incidents: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(EngineError::UnknownTier(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub reason_weight: u32,
    pub frequency_weight: u32,
    pub absence_weight: u32,
    pub low_grade_weight: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierClassification {
    pub tier: RiskTier,
    pub color: &'static str,
    pub color_name: &'static str,
    pub icon: &'static str,
    pub label: &'static str,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskEvaluation {
    pub student_id: String,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub program: String,
    pub term: String,
    pub score: u32,
    pub breakdown: ScoreBreakdown,
    pub classification: TierClassification,
    pub top_reasons: Vec<String>,
    pub session_count: usize,
    pub absence_count: usize,
    pub low_grade_count: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl RiskEvaluation {
    pub fn tier(&self) -> RiskTier {
        self.classification.tier
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.paternal_surname, self.maternal_surname
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskStatistics {
    pub total: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub pct_high: f64,
    pub pct_medium: f64,
    pub pct_low: f64,
    pub avg_score: f64,
}

/// Optional narrowing criteria; an absent or empty field imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFilter {
    #[serde(default)]
    pub tier: Option<RiskTier>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermGroup {
    pub term: String,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermStats {
    pub total: usize,
    pub reason_counts: Vec<ReasonCount>,
    pub top_reason: String,
    pub top_reason_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermSummary {
    pub term: String,
    #[serde(flatten)]
    pub stats: TermStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Worsening,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Worsening => "worsening",
            Self::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub detected: bool,
    pub description: String,
    pub terms_analyzed: usize,
    pub direction: TrendDirection,
}

impl Trend {
    pub fn stable(terms_analyzed: usize) -> Self {
        Self {
            detected: false,
            description: String::new(),
            terms_analyzed,
            direction: TrendDirection::Stable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recurrence {
    pub category: String,
    pub count: usize,
    pub percentage: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    RecurrenceHigh,
    RecurrenceMedium,
    Worsening,
    Improvement,
    HighVolume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    Warning,
    Positive,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Positive => "positive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryAnalysis {
    pub total_sessions: usize,
    pub terms_recorded: usize,
    pub sessions_by_term: Vec<TermGroup>,
    pub per_term_stats: Vec<TermSummary>,
    pub overall_reason_counts: Vec<ReasonCount>,
    pub trend: Trend,
    pub recurrences: Vec<Recurrence>,
    pub alerts: Vec<Alert>,
}

impl HistoryAnalysis {
    pub fn empty() -> Self {
        Self {
            total_sessions: 0,
            terms_recorded: 0,
            sessions_by_term: Vec::new(),
            per_term_stats: Vec::new(),
            overall_reason_counts: Vec::new(),
            trend: Trend::stable(0),
            recurrences: Vec::new(),
            alerts: Vec::new(),
        }
    }
}

/// Labels and values ready for a chart widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<usize>,
}

/// Rounds to two decimals, as percentages and averages are displayed.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_sort_value_treats_non_digits_as_zero() {
        assert_eq!(term_sort_value("7"), 7);
        assert_eq!(term_sort_value("10"), 10);
        assert_eq!(term_sort_value("N/A"), 0);
        assert_eq!(term_sort_value("7a"), 0);
        assert_eq!(term_sort_value("99999999999999999999999"), u64::MAX);
        assert_eq!(term_sort_value(""), 0);
    }

    #[test]
    fn missing_term_uses_sentinel_key() {
        let mut session = Session::new("Asesoría general", "3");
        session.term = None;
        assert_eq!(session.term_key(), UNKNOWN_TERM);
    }

    #[test]
    fn session_accepts_empty_date() {
        let session: Session =
            serde_json::from_str(r#"{"reason": "Inasistencias", "term": "5", "date": ""}"#)
                .expect("valid session");
        assert_eq!(session.date, None);

        let dated: Session =
            serde_json::from_str(r#"{"reason": "Inasistencias", "date": "2025-10-15"}"#)
                .expect("valid session");
        assert_eq!(dated.date, NaiveDate::from_ymd_opt(2025, 10, 15));
        assert_eq!(dated.term_key(), UNKNOWN_TERM);
    }

    #[test]
    fn student_input_requires_sessions() {
        let err = serde_json::from_str::<StudentInput>(r#"{"absences": 2}"#).unwrap_err();
        assert!(err.to_string().contains("sessions"));
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<RiskTier>().unwrap(), RiskTier::High);
        assert!(matches!(
            "severe".parse::<RiskTier>(),
            Err(EngineError::UnknownTier(_))
        ));
    }

    #[test]
    fn round2_rounds_to_two_decimals() {
        assert_eq!(round2(33.33333), 33.33);
        assert_eq!(round2(66.666), 66.67);
    }
}
