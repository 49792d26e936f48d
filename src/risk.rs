use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::RiskConfig;
use crate::models::{
    round2, EvaluationFilter, RiskEvaluation, RiskStatistics, RiskTier, ScoreBreakdown, Session,
    StudentInfo, StudentInput, TierClassification, CRITICAL_COLOR, POSITIVE_COLOR, WARNING_COLOR,
};

/// Heuristic academic risk score for one student at a time.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: RiskConfig,
}

impl RiskScorer {
    /// Keywords are lower-cased here so they match lower-cased reasons
    /// however they were written in the config.
    pub fn new(mut config: RiskConfig) -> Self {
        for entry in config.reason_weights.iter_mut() {
            entry.keyword = entry.keyword.to_lowercase();
        }
        Self { config }
    }

    /// Sum of keyword weights over the sessions. Each distinct lower-cased
    /// reason text contributes at most once, and only its first matching
    /// keyword counts.
    pub fn reason_weight(&self, sessions: &[Session]) -> u32 {
        let mut seen: HashSet<String> = HashSet::new();
        let mut weight = 0;

        for session in sessions {
            let reason = session.reason.to_lowercase();
            let matched = self
                .config
                .reason_weights
                .iter()
                .find(|entry| reason.contains(entry.keyword.as_str()));

            if let Some(entry) = matched {
                if seen.insert(reason) {
                    weight += entry.weight;
                }
            }
        }

        weight
    }

    pub fn frequency_weight(&self, session_count: usize) -> u32 {
        self.config.frequency.weight(session_count)
    }

    pub fn absence_weight(&self, absences: usize) -> u32 {
        self.config.absences.weight(absences)
    }

    pub fn low_grade_weight(&self, low_grade_incidents: usize) -> u32 {
        self.config.low_grades.weight(low_grade_incidents)
    }

    pub fn score(
        &self,
        sessions: &[Session],
        absences: usize,
        low_grade_incidents: usize,
    ) -> ScoreBreakdown {
        let reason_weight = self.reason_weight(sessions);
        let frequency_weight = self.frequency_weight(sessions.len());
        let absence_weight = self.absence_weight(absences);
        let low_grade_weight = self.low_grade_weight(low_grade_incidents);

        ScoreBreakdown {
            reason_weight,
            frequency_weight,
            absence_weight,
            low_grade_weight,
            total: reason_weight + frequency_weight + absence_weight + low_grade_weight,
        }
    }

    pub fn classify(&self, total_score: u32) -> TierClassification {
        if total_score >= self.config.tiers.high {
            TierClassification {
                tier: RiskTier::High,
                color: CRITICAL_COLOR,
                color_name: "red",
                icon: "🔴",
                label: "High Risk - Urgent Intervention",
                recommendation: "Immediate intervention and intensive follow-up recommended",
            }
        } else if total_score >= self.config.tiers.medium {
            TierClassification {
                tier: RiskTier::Medium,
                color: WARNING_COLOR,
                color_name: "orange",
                icon: "🟡",
                label: "Medium Risk - Monitoring Required",
                recommendation: "Regular monitoring and academic follow-up recommended",
            }
        } else {
            TierClassification {
                tier: RiskTier::Low,
                color: POSITIVE_COLOR,
                color_name: "green",
                icon: "🟢",
                label: "Low Risk - Satisfactory Performance",
                recommendation: "Continue routine academic follow-up",
            }
        }
    }

    /// Most frequent raw reasons, highest count first, ties in first-seen order.
    pub fn top_reasons(&self, sessions: &[Session]) -> Vec<String> {
        let mut counts: Vec<(&str, usize)> = Vec::new();

        for session in sessions {
            match counts.iter_mut().find(|(reason, _)| *reason == session.reason) {
                Some((_, count)) => *count += 1,
                None => counts.push((session.reason.as_str(), 1)),
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(self.config.top_reasons)
            .map(|(reason, _)| reason.to_string())
            .collect()
    }

    pub fn evaluate(
        &self,
        info: &StudentInfo,
        sessions: &[Session],
        absences: usize,
        low_grade_incidents: usize,
    ) -> RiskEvaluation {
        self.evaluate_at(info, sessions, absences, low_grade_incidents, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        info: &StudentInfo,
        sessions: &[Session],
        absences: usize,
        low_grade_incidents: usize,
        evaluated_at: DateTime<Utc>,
    ) -> RiskEvaluation {
        let breakdown = self.score(sessions, absences, low_grade_incidents);
        let classification = self.classify(breakdown.total);
        let echo = |field: &Option<String>| field.clone().unwrap_or_else(|| "N/A".to_string());

        debug!(
            student_id = info.student_id.as_deref().unwrap_or("N/A"),
            score = breakdown.total,
            tier = %classification.tier,
            "evaluated student"
        );

        RiskEvaluation {
            student_id: echo(&info.student_id),
            first_name: echo(&info.first_name),
            paternal_surname: echo(&info.paternal_surname),
            maternal_surname: echo(&info.maternal_surname),
            program: echo(&info.program),
            term: echo(&info.term),
            score: breakdown.total,
            breakdown,
            classification,
            top_reasons: self.top_reasons(sessions),
            session_count: sessions.len(),
            absence_count: absences,
            low_grade_count: low_grade_incidents,
            evaluated_at,
        }
    }

    /// Evaluates every student, highest score first. Equal scores keep input order.
    pub fn evaluate_batch(&self, students: &[StudentInput]) -> Vec<RiskEvaluation> {
        let evaluated_at = Utc::now();
        let mut evaluations: Vec<RiskEvaluation> = students
            .iter()
            .map(|student| {
                self.evaluate_at(
                    &student.info,
                    &student.sessions,
                    student.absences,
                    student.low_grade_incidents,
                    evaluated_at,
                )
            })
            .collect();

        evaluations.sort_by(|a, b| b.score.cmp(&a.score));
        info!(students = evaluations.len(), "evaluated batch");
        evaluations
    }
}

pub fn aggregate_statistics(evaluations: &[RiskEvaluation]) -> RiskStatistics {
    if evaluations.is_empty() {
        return RiskStatistics::default();
    }

    let total = evaluations.len();
    let count_tier = |tier: RiskTier| evaluations.iter().filter(|e| e.tier() == tier).count();
    let high_count = count_tier(RiskTier::High);
    let medium_count = count_tier(RiskTier::Medium);
    let low_count = count_tier(RiskTier::Low);
    let pct = |count: usize| round2(count as f64 / total as f64 * 100.0);
    let score_sum: u64 = evaluations.iter().map(|e| u64::from(e.score)).sum();

    RiskStatistics {
        total,
        high_count,
        medium_count,
        low_count,
        pct_high: pct(high_count),
        pct_medium: pct(medium_count),
        pct_low: pct(low_count),
        avg_score: round2(score_sum as f64 / total as f64),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Keeps the evaluations matching every filter that is set.
pub fn filter_evaluations(
    evaluations: Vec<RiskEvaluation>,
    filter: &EvaluationFilter,
) -> Vec<RiskEvaluation> {
    let program = non_empty(&filter.program);
    let term = non_empty(&filter.term);
    let search = non_empty(&filter.search).map(str::to_lowercase);

    evaluations
        .into_iter()
        .filter(|e| filter.tier.map_or(true, |tier| e.tier() == tier))
        .filter(|e| program.map_or(true, |program| e.program == program))
        .filter(|e| term.map_or(true, |term| e.term == term))
        .filter(|e| {
            search.as_deref().map_or(true, |needle| {
                e.first_name.to_lowercase().contains(needle)
                    || e.paternal_surname.to_lowercase().contains(needle)
                    || e.student_id.to_lowercase().contains(needle)
            })
        })
        .collect()
}
