//! Normalization of free-text session reasons into canonical categories.

use crate::config::CategoryRule;

/// Maps free-text reasons to categories by case-insensitive substring
/// match. Rules are tried in order and the first hit wins; a reason that
/// matches nothing is its own category.
#[derive(Debug, Clone)]
pub struct ReasonNormalizer {
    rules: Vec<(String, String)>,
}

impl ReasonNormalizer {
    pub fn new(rules: &[CategoryRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| (rule.keyword.to_lowercase(), rule.category.clone()))
                .collect(),
        }
    }

    pub fn category<'a>(&'a self, reason: &'a str) -> &'a str {
        let lowered = reason.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword.as_str()))
            .map(|(_, category)| category.as_str())
            .unwrap_or(reason)
    }
}

impl Default for ReasonNormalizer {
    fn default() -> Self {
        Self::new(&crate::config::HistoryConfig::default().categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_phrases_to_categories() {
        let normalizer = ReasonNormalizer::default();
        assert_eq!(normalizer.category("Baja calificación en Matemáticas"), "Low Grade");
        assert_eq!(normalizer.category("Bajo desempeño académico"), "Low Grade");
        assert_eq!(normalizer.category("INASISTENCIAS recurrentes"), "Absences");
        assert_eq!(normalizer.category("Falta de motivación"), "Behavioral Issues");
        assert_eq!(normalizer.category("Reforzamiento de Álgebra"), "Academic Reinforcement");
        assert_eq!(normalizer.category("Asesoría general sobre horarios"), "General Advising");
    }

    #[test]
    fn unknown_reason_is_its_own_category() {
        let normalizer = ReasonNormalizer::default();
        assert_eq!(
            normalizer.category("Necesita apoyo en proyecto final"),
            "Necesita apoyo en proyecto final"
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let normalizer = ReasonNormalizer::default();
        assert_eq!(
            normalizer.category("Baja calificación por inasistencia"),
            "Low Grade"
        );
        assert_eq!(
            normalizer.category("Inasistencia con baja calificación"),
            "Low Grade"
        );

        let reordered = ReasonNormalizer::new(&[
            CategoryRule {
                keyword: "inasistencia".to_string(),
                category: "Absences".to_string(),
            },
            CategoryRule {
                keyword: "baja calificación".to_string(),
                category: "Low Grade".to_string(),
            },
        ]);
        assert_eq!(
            reordered.category("Baja calificación por inasistencia"),
            "Absences"
        );
    }
}
