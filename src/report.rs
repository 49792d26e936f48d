use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{AlertLevel, ChartSeries, ReasonCount, RiskTier};
use crate::risk;
use crate::students::StudentReport;

/// Sums per-student category counts into one cohort-wide tally, highest first.
pub fn merge_reason_counts(reports: &[StudentReport]) -> Vec<ReasonCount> {
    let mut merged: Vec<ReasonCount> = Vec::new();

    for entry in reports
        .iter()
        .flat_map(|report| report.analysis.overall_reason_counts.iter())
    {
        match merged.iter_mut().find(|m| m.category == entry.category) {
            Some(existing) => existing.count += entry.count,
            None => merged.push(entry.clone()),
        }
    }

    merged.sort_by(|a, b| b.count.cmp(&a.count));
    merged
}

pub fn build_cohort_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    reports: &[StudentReport],
) -> String {
    let evaluations: Vec<_> = reports.iter().map(|r| r.evaluation.clone()).collect();
    let stats = risk::aggregate_statistics(&evaluations);
    let reasons = merge_reason_counts(reports);

    let mut ranked: Vec<&StudentReport> = reports.iter().collect();
    ranked.sort_by(|a, b| b.evaluation.score.cmp(&a.evaluation.score));

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all programs");

    let _ = writeln!(output, "# Tutoring Early Warning Report");
    let _ = writeln!(output, "Generated for {} on {}", scope_label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");

    if stats.total == 0 {
        let _ = writeln!(output, "No students recorded.");
    } else {
        let _ = writeln!(output, "- High: {} ({:.2}%)", stats.high_count, stats.pct_high);
        let _ = writeln!(output, "- Medium: {} ({:.2}%)", stats.medium_count, stats.pct_medium);
        let _ = writeln!(output, "- Low: {} ({:.2}%)", stats.low_count, stats.pct_low);
        let _ = writeln!(
            output,
            "Average score {:.2} across {} students",
            stats.avg_score, stats.total
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if ranked.is_empty() {
        let _ = writeln!(output, "No students recorded.");
    } else {
        for report in ranked.iter().take(10) {
            let evaluation = &report.evaluation;
            let _ = writeln!(
                output,
                "- {} {} ({}, {}, term {}) score {} across {} sessions",
                evaluation.classification.icon,
                evaluation.full_name(),
                evaluation.student_id,
                evaluation.program,
                evaluation.term,
                evaluation.score,
                evaluation.session_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reason Mix");

    if reasons.is_empty() {
        let _ = writeln!(output, "No sessions recorded.");
    } else {
        for entry in reasons.iter() {
            let _ = writeln!(output, "- {}: {} sessions", entry.category, entry.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Critical Alerts");

    let mut critical = 0usize;
    for report in ranked.iter() {
        for alert in report
            .analysis
            .alerts
            .iter()
            .filter(|alert| alert.level == AlertLevel::Critical)
        {
            critical += 1;
            let _ = writeln!(
                output,
                "- {} ({}): {}",
                report.evaluation.full_name(),
                report.evaluation.student_id,
                alert.message
            );
        }
    }
    if critical == 0 {
        let _ = writeln!(output, "No critical alerts.");
    }

    output
}

fn write_series(output: &mut String, title: &str, series: &ChartSeries) {
    let _ = writeln!(output, "### {}", title);
    if series.labels.is_empty() {
        let _ = writeln!(output, "No data.");
        return;
    }
    for (label, value) in series.labels.iter().zip(series.data.iter()) {
        let _ = writeln!(output, "- {}: {}", label, value);
    }
}

pub fn render_student_report(report: &StudentReport) -> String {
    let evaluation = &report.evaluation;
    let analysis = &report.analysis;
    let breakdown = &evaluation.breakdown;
    let mut output = String::new();

    let _ = writeln!(output, "# Student Risk Report: {}", evaluation.full_name());
    let _ = writeln!(
        output,
        "ID {} | {} | term {}",
        evaluation.student_id, evaluation.program, evaluation.term
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Risk");
    let _ = writeln!(
        output,
        "{} {} (score {})",
        evaluation.classification.icon, evaluation.classification.label, evaluation.score
    );
    let _ = writeln!(output, "- Reasons: {}", breakdown.reason_weight);
    let _ = writeln!(
        output,
        "- Frequency: {} ({} sessions)",
        breakdown.frequency_weight, evaluation.session_count
    );
    let _ = writeln!(
        output,
        "- Absences: {} ({} recorded)",
        breakdown.absence_weight, evaluation.absence_count
    );
    let _ = writeln!(
        output,
        "- Low grades: {} ({} recorded)",
        breakdown.low_grade_weight, evaluation.low_grade_count
    );
    let _ = writeln!(output, "{}", evaluation.classification.recommendation);
    if evaluation.tier() == RiskTier::High && !evaluation.top_reasons.is_empty() {
        let _ = writeln!(output, "Most frequent: {}", evaluation.top_reasons.join(", "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sessions by Term");

    if analysis.per_term_stats.is_empty() {
        let _ = writeln!(output, "No sessions recorded.");
    } else {
        for summary in analysis.per_term_stats.iter() {
            let _ = writeln!(
                output,
                "- Term {}: {} sessions, mostly {} ({})",
                summary.term,
                summary.stats.total,
                summary.stats.top_reason,
                summary.stats.top_reason_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    if analysis.trend.description.is_empty() {
        let _ = writeln!(
            output,
            "{} across {} terms",
            analysis.trend.direction.as_str(),
            analysis.trend.terms_analyzed
        );
    } else {
        let _ = writeln!(output, "{}", analysis.trend.description);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    if analysis.alerts.is_empty() {
        let _ = writeln!(output, "No alerts.");
    } else {
        for alert in analysis.alerts.iter() {
            let _ = writeln!(output, "- [{}] {}", alert.level.as_str(), alert.message);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Chart Data");
    write_series(&mut output, "Sessions per term", &report.term_chart);
    write_series(&mut output, "Top reasons", &report.reason_chart);

    output
}
