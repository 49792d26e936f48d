//! Term-by-term analysis of a student's session history: grouping,
//! recurring reasons, trend between the two most recent terms, alerts and
//! chart series.

use tracing::debug;

use crate::config::HistoryConfig;
use crate::models::{
    round2, term_sort_value, Alert, AlertKind, AlertLevel, ChartSeries, HistoryAnalysis, ReasonCount,
    Recurrence, Session, Severity, TermGroup, TermStats, TermSummary, Trend, TrendDirection,
    CRITICAL_COLOR, POSITIVE_COLOR, WARNING_COLOR,
};
use crate::reasons::ReasonNormalizer;

#[derive(Debug, Clone)]
pub struct HistoryAnalyzer {
    config: HistoryConfig,
    normalizer: ReasonNormalizer,
}

impl Default for HistoryAnalyzer {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl HistoryAnalyzer {
    pub fn new(config: HistoryConfig) -> Self {
        let normalizer = ReasonNormalizer::new(&config.categories);
        Self { config, normalizer }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Groups sessions by term, most recent term first. Sessions keep their
    /// input order within a term; non-numeric terms sort last.
    pub fn group_by_term(&self, sessions: &[Session]) -> Vec<TermGroup> {
        let mut groups: Vec<TermGroup> = Vec::new();

        for session in sessions {
            let key = session.term_key();
            match groups.iter_mut().find(|group| group.term == key) {
                Some(group) => group.sessions.push(session.clone()),
                None => groups.push(TermGroup {
                    term: key.to_string(),
                    sessions: vec![session.clone()],
                }),
            }
        }

        groups.sort_by(|a, b| term_sort_value(&b.term).cmp(&term_sort_value(&a.term)));
        groups
    }

    /// Counts sessions per reason category, highest count first. Ties keep
    /// the order in which categories were first seen.
    pub fn count_reasons(&self, sessions: &[Session]) -> Vec<ReasonCount> {
        let mut counts: Vec<ReasonCount> = Vec::new();

        for session in sessions {
            let category = self.normalizer.category(&session.reason);
            match counts.iter_mut().find(|entry| entry.category == category) {
                Some(entry) => entry.count += 1,
                None => counts.push(ReasonCount {
                    category: category.to_string(),
                    count: 1,
                }),
            }
        }

        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }

    /// Compares session volume between the two most recent terms. Only a
    /// drop counts as a detected trend.
    pub fn detect_trend(&self, groups: &[TermGroup]) -> Trend {
        if groups.len() < 2 {
            return Trend::stable(groups.len());
        }

        let mut ascending: Vec<&TermGroup> = groups.iter().collect();
        ascending.sort_by_key(|group| term_sort_value(&group.term));

        let latest = ascending[ascending.len() - 1].sessions.len();
        let previous = ascending[ascending.len() - 2].sessions.len();

        let mut trend = Trend::stable(groups.len());
        if latest < previous {
            trend.detected = true;
            trend.direction = TrendDirection::Improving;
            trend.description = format!("Session frequency dropped: {previous} → {latest}");
        } else if latest > previous {
            trend.direction = TrendDirection::Worsening;
        }
        trend
    }

    pub fn detect_recurrences(&self, sessions: &[Session], threshold: usize) -> Vec<Recurrence> {
        let total = sessions.len();

        self.count_reasons(sessions)
            .into_iter()
            .filter(|entry| entry.count >= threshold)
            .map(|entry| Recurrence {
                percentage: if total == 0 {
                    0.0
                } else {
                    round2(entry.count as f64 / total as f64 * 100.0)
                },
                severity: if entry.count >= self.config.high_severity_at {
                    Severity::High
                } else {
                    Severity::Medium
                },
                category: entry.category,
                count: entry.count,
            })
            .collect()
    }

    pub fn per_term_stats(&self, term_sessions: &[Session]) -> TermStats {
        if term_sessions.is_empty() {
            return TermStats {
                total: 0,
                reason_counts: Vec::new(),
                top_reason: "N/A".to_string(),
                top_reason_count: 0,
            };
        }

        let reason_counts = self.count_reasons(term_sessions);
        // Counts are sorted descending, so the first entry is the first maximum.
        let (top_reason, top_reason_count) = reason_counts
            .first()
            .map(|entry| (entry.category.clone(), entry.count))
            .unwrap_or_else(|| ("N/A".to_string(), 0));

        TermStats {
            total: term_sessions.len(),
            reason_counts,
            top_reason,
            top_reason_count,
        }
    }

    pub fn full_analysis(&self, sessions: &[Session]) -> HistoryAnalysis {
        if sessions.is_empty() {
            return HistoryAnalysis::empty();
        }

        let sessions_by_term = self.group_by_term(sessions);
        let overall_reason_counts = self.count_reasons(sessions);
        let trend = self.detect_trend(&sessions_by_term);
        let recurrences = self.detect_recurrences(sessions, self.config.recurrence_threshold);

        let per_term_stats = sessions_by_term
            .iter()
            .map(|group| TermSummary {
                term: group.term.clone(),
                stats: self.per_term_stats(&group.sessions),
            })
            .collect();

        let alerts = self.build_alerts(&sessions_by_term, &recurrences, &trend);

        debug!(
            sessions = sessions.len(),
            terms = sessions_by_term.len(),
            recurrences = recurrences.len(),
            alerts = alerts.len(),
            "analyzed session history"
        );

        HistoryAnalysis {
            total_sessions: sessions.len(),
            terms_recorded: sessions_by_term.len(),
            sessions_by_term,
            per_term_stats,
            overall_reason_counts,
            trend,
            recurrences,
            alerts,
        }
    }

    /// Alerts in display order: recurrences, worsening, improvement, then
    /// high volume in the most recent term.
    pub fn build_alerts(
        &self,
        groups: &[TermGroup],
        recurrences: &[Recurrence],
        trend: &Trend,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for recurrence in recurrences {
            // `{:?}` prints 60.0 and 33.33 alike, where `{}` would drop the `.0`.
            let alert = match recurrence.severity {
                Severity::High => Alert {
                    kind: AlertKind::RecurrenceHigh,
                    level: AlertLevel::Critical,
                    message: format!(
                        "Critical recurrence: '{}' appears {} times ({:?}%)",
                        recurrence.category, recurrence.count, recurrence.percentage
                    ),
                    color: CRITICAL_COLOR,
                },
                Severity::Medium => Alert {
                    kind: AlertKind::RecurrenceMedium,
                    level: AlertLevel::Warning,
                    message: format!(
                        "Recurrence: '{}' appears {} times",
                        recurrence.category, recurrence.count
                    ),
                    color: WARNING_COLOR,
                },
            };
            alerts.push(alert);
        }

        if trend.direction == TrendDirection::Worsening {
            alerts.push(Alert {
                kind: AlertKind::Worsening,
                level: AlertLevel::Warning,
                message: "Worsening trend: session frequency increased".to_string(),
                color: WARNING_COLOR,
            });
        }

        if trend.detected {
            let message = if trend.description.is_empty() {
                "Improvement detected".to_string()
            } else {
                trend.description.clone()
            };
            alerts.push(Alert {
                kind: AlertKind::Improvement,
                level: AlertLevel::Positive,
                message,
                color: POSITIVE_COLOR,
            });
        }

        if let Some(latest) = groups.first() {
            if latest.sessions.len() >= self.config.high_volume_at {
                alerts.push(Alert {
                    kind: AlertKind::HighVolume,
                    level: AlertLevel::Critical,
                    message: format!(
                        "High session volume in the most recent term: {} sessions",
                        latest.sessions.len()
                    ),
                    color: CRITICAL_COLOR,
                });
            }
        }

        alerts
    }

    pub fn chart_series_by_term(&self, groups: &[TermGroup]) -> ChartSeries {
        let mut ascending: Vec<&TermGroup> = groups.iter().collect();
        ascending.sort_by_key(|group| term_sort_value(&group.term));

        ChartSeries {
            labels: ascending
                .iter()
                .map(|group| format!("{}°", group.term))
                .collect(),
            data: ascending.iter().map(|group| group.sessions.len()).collect(),
        }
    }

    pub fn chart_series_by_reason(&self, reason_counts: &[ReasonCount], limit: usize) -> ChartSeries {
        let mut sorted: Vec<&ReasonCount> = reason_counts.iter().collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted.truncate(limit);

        ChartSeries {
            labels: sorted.iter().map(|entry| entry.category.clone()).collect(),
            data: sorted.iter().map(|entry| entry.count).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sessions(pairs: &[(&str, &str)]) -> Vec<Session> {
        pairs.iter()
            .map(|(reason, term)| Session::new(*reason, *term))
            .collect()
    }

    fn repeated(reason: &str, term: &str, count: usize) -> Vec<Session> {
        (0..count).map(|_| Session::new(reason, term)).collect()
    }

    #[test]
    fn groups_by_term_most_recent_first() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = sessions(&[
            ("Baja calificación en Física", "6"),
            ("Inasistencias", "10"),
            ("Reforzamiento", "7"),
            ("Asesoría general", "6"),
        ]);
        let mut untermed = Session::new("Asesoría general", "x");
        untermed.term = None;
        input.push(untermed);

        let groups = analyzer.group_by_term(&input);
        let terms: Vec<&str> = groups.iter().map(|g| g.term.as_str()).collect();
        assert_eq!(terms, vec!["10", "7", "6", "N/A"]);

        let six = &groups[2];
        assert_eq!(six.sessions[0].reason, "Baja calificación en Física");
        assert_eq!(six.sessions[1].reason, "Asesoría general");
    }

    #[test]
    fn counts_categories_descending() {
        let analyzer = HistoryAnalyzer::default();
        let input = sessions(&[
            ("Inasistencias", "5"),
            ("Baja calificación en Física", "5"),
            ("Bajo desempeño", "6"),
            ("Proyecto final", "6"),
        ]);

        let counts = analyzer.count_reasons(&input);
        assert_eq!(
            counts,
            vec![
                ReasonCount {
                    category: "Low Grade".to_string(),
                    count: 2
                },
                ReasonCount {
                    category: "Absences".to_string(),
                    count: 1
                },
                ReasonCount {
                    category: "Proyecto final".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn rising_volume_is_worsening_but_not_detected() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Inasistencias", "5", 2);
        input.extend(repeated("Inasistencias", "6", 2));
        input.extend(repeated("Inasistencias", "7", 5));

        let trend = analyzer.detect_trend(&analyzer.group_by_term(&input));
        assert_eq!(trend.direction, TrendDirection::Worsening);
        assert!(!trend.detected);
        assert_eq!(trend.terms_analyzed, 3);
    }

    #[test]
    fn falling_volume_is_a_detected_improvement() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Inasistencias", "5", 5);
        input.extend(repeated("Inasistencias", "6", 5));
        input.extend(repeated("Inasistencias", "7", 2));

        let trend = analyzer.detect_trend(&analyzer.group_by_term(&input));
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!(trend.detected);
        assert!(trend.description.contains('5'));
        assert!(trend.description.contains('2'));
    }

    #[test]
    fn equal_volume_is_stable() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Inasistencias", "5", 2);
        input.extend(repeated("Inasistencias", "6", 2));

        let trend = analyzer.detect_trend(&analyzer.group_by_term(&input));
        assert_eq!(trend, Trend::stable(2));
    }

    #[test]
    fn single_term_has_no_trend() {
        let analyzer = HistoryAnalyzer::default();
        let trend = analyzer.detect_trend(&analyzer.group_by_term(&repeated("x", "3", 4)));
        assert_eq!(trend, Trend::stable(1));
    }

    #[test]
    fn recurrence_threshold_and_severity() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Baja calificación", "5", 5);
        input.extend(repeated("Inasistencias", "5", 3));
        input.extend(repeated("Problemas de conducta", "5", 2));

        let recurrences = analyzer.detect_recurrences(&input, 3);
        assert_eq!(recurrences.len(), 2);
        assert_eq!(recurrences[0].category, "Low Grade");
        assert_eq!(recurrences[0].severity, Severity::High);
        assert_eq!(recurrences[0].percentage, 50.0);
        assert_eq!(recurrences[1].category, "Absences");
        assert_eq!(recurrences[1].severity, Severity::Medium);
        assert_eq!(recurrences[1].percentage, 30.0);
    }

    #[test]
    fn recurrences_of_nothing_are_empty() {
        let analyzer = HistoryAnalyzer::default();
        assert!(analyzer.detect_recurrences(&[], 3).is_empty());
    }

    #[test]
    fn per_term_stats_of_empty_term() {
        let analyzer = HistoryAnalyzer::default();
        let stats = analyzer.per_term_stats(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.reason_counts.is_empty());
        assert_eq!(stats.top_reason, "N/A");
        assert_eq!(stats.top_reason_count, 0);
    }

    #[test]
    fn per_term_stats_picks_first_maximum() {
        let analyzer = HistoryAnalyzer::default();
        let input = sessions(&[
            ("Inasistencias", "5"),
            ("Baja calificación", "5"),
            ("Baja calificación", "5"),
            ("Inasistencias", "5"),
        ]);
        let stats = analyzer.per_term_stats(&input);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.top_reason, "Absences");
        assert_eq!(stats.top_reason_count, 2);
    }

    #[test]
    fn empty_history_yields_zeroed_analysis() {
        let analyzer = HistoryAnalyzer::default();
        assert_eq!(analyzer.full_analysis(&[]), HistoryAnalysis::empty());
    }

    #[test]
    fn alerts_follow_emission_order() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Baja calificación", "6", 1);
        input.extend(repeated("Baja calificación", "7", 5));
        input.extend(repeated("Inasistencias", "7", 3));

        let analysis = analyzer.full_analysis(&input);
        let kinds: Vec<AlertKind> = analysis.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::RecurrenceHigh,
                AlertKind::RecurrenceMedium,
                AlertKind::Worsening,
                AlertKind::HighVolume,
            ]
        );
        assert_eq!(analysis.alerts[0].color, CRITICAL_COLOR);
        assert_eq!(analysis.alerts[0].level, AlertLevel::Critical);
        assert!(analysis.alerts[0].message.contains("6 times"));
        assert!(analysis.alerts[3].message.contains('8'));
    }

    #[test]
    fn critical_recurrence_message_keeps_decimal_point() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Baja calificación", "7", 6);
        input.extend(repeated("Inasistencias", "6", 4));

        let analysis = analyzer.full_analysis(&input);
        assert_eq!(
            analysis.alerts[0].message,
            "Critical recurrence: 'Low Grade' appears 6 times (60.0%)"
        );
    }

    #[test]
    fn high_volume_alert_starts_at_five_sessions_in_latest_term() {
        let analyzer = HistoryAnalyzer::default();
        let has_high_volume = |count: usize| {
            let input = repeated("Proyecto final", "7", count);
            analyzer
                .full_analysis(&input)
                .alerts
                .iter()
                .any(|alert| alert.kind == AlertKind::HighVolume)
        };

        assert!(!has_high_volume(4));
        assert!(has_high_volume(5));
    }

    #[test]
    fn improvement_alert_uses_trend_description() {
        let analyzer = HistoryAnalyzer::default();
        let mut input = repeated("Asesoría general", "6", 2);
        input.extend(repeated("Reforzamiento", "7", 1));

        let analysis = analyzer.full_analysis(&input);
        assert_eq!(analysis.alerts.len(), 1);
        let alert = &analysis.alerts[0];
        assert_eq!(alert.kind, AlertKind::Improvement);
        assert_eq!(alert.level, AlertLevel::Positive);
        assert_eq!(alert.color, POSITIVE_COLOR);
        assert_eq!(alert.message, analysis.trend.description);
    }

    #[test]
    fn chart_series_by_term_is_ascending_with_degree_labels() {
        let analyzer = HistoryAnalyzer::default();
        let input = sessions(&[("a", "7"), ("b", "5"), ("c", "7"), ("d", "10")]);
        let series = analyzer.chart_series_by_term(&analyzer.group_by_term(&input));
        assert_eq!(series.labels, vec!["5°", "7°", "10°"]);
        assert_eq!(series.data, vec![1, 2, 1]);
    }

    #[test]
    fn chart_series_by_reason_respects_limit() {
        let analyzer = HistoryAnalyzer::default();
        let counts = vec![
            ReasonCount {
                category: "A".to_string(),
                count: 1,
            },
            ReasonCount {
                category: "B".to_string(),
                count: 4,
            },
            ReasonCount {
                category: "C".to_string(),
                count: 2,
            },
        ];
        let series = analyzer.chart_series_by_reason(&counts, 2);
        assert_eq!(series.labels, vec!["B", "C"]);
        assert_eq!(series.data, vec![4, 2]);
    }
}
