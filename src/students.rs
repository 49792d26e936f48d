//! Caller-side glue: turns stored students and sessions into engine inputs,
//! and merges both analyses into one view model per student.

use std::collections::HashMap;
use std::io::Read;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::history::HistoryAnalyzer;
use crate::models::{ChartSeries, HistoryAnalysis, RiskEvaluation, Session, StudentInfo, StudentInput};
use crate::risk::RiskScorer;

/// A stored student with the incident counts recorded outside of tutoring.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub id: Uuid,
    pub info: StudentInfo,
    pub absences: usize,
    pub low_grade_incidents: usize,
}

/// Attaches each session to its student. Students keep their input order
/// and sessions keep theirs; sessions of unknown students are dropped.
pub fn assemble(students: Vec<StudentRecord>, sessions: Vec<(Uuid, Session)>) -> Vec<StudentInput> {
    let mut by_student: HashMap<Uuid, Vec<Session>> = HashMap::new();
    for (student_id, session) in sessions {
        by_student.entry(student_id).or_default().push(session);
    }

    let inputs: Vec<StudentInput> = students
        .into_iter()
        .map(|student| StudentInput {
            sessions: by_student.remove(&student.id).unwrap_or_default(),
            info: student.info,
            absences: student.absences,
            low_grade_incidents: student.low_grade_incidents,
        })
        .collect();

    let orphaned: usize = by_student.values().map(Vec::len).sum();
    if orphaned > 0 {
        warn!(orphaned, "sessions reference unknown students and were skipped");
    }

    inputs
}

/// Reads a JSON array of student inputs. Entries missing their session list
/// are rejected rather than treated as empty.
pub fn load_batch<R: Read>(reader: R) -> Result<Vec<StudentInput>> {
    Ok(serde_json::from_reader(reader)?)
}

/// Everything a renderer needs for one student.
#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub evaluation: RiskEvaluation,
    pub analysis: HistoryAnalysis,
    pub term_chart: ChartSeries,
    pub reason_chart: ChartSeries,
}

pub fn build_student_report(
    scorer: &RiskScorer,
    analyzer: &HistoryAnalyzer,
    student: &StudentInput,
) -> StudentReport {
    let analysis = analyzer.full_analysis(&student.sessions);
    let evaluation = scorer.evaluate(
        &student.info,
        &student.sessions,
        student.absences,
        student.low_grade_incidents,
    );
    let term_chart = analyzer.chart_series_by_term(&analysis.sessions_by_term);
    let reason_chart = analyzer.chart_series_by_reason(
        &analysis.overall_reason_counts,
        analyzer.config().chart_reason_limit,
    );

    StudentReport {
        evaluation,
        analysis,
        term_chart,
        reason_chart,
    }
}
