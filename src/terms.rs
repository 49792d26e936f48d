use chrono::{Datelike, Utc};
use serde::Serialize;

/// One of the three four-month periods of the academic year. Each period
/// only offers a subset of the terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcademicPeriod {
    SeptemberDecember,
    JanuaryApril,
    MayAugust,
}

impl AcademicPeriod {
    pub fn from_month(month: u32) -> Self {
        match month {
            9..=12 => Self::SeptemberDecember,
            1..=4 => Self::JanuaryApril,
            _ => Self::MayAugust,
        }
    }

    pub fn current() -> Self {
        Self::from_month(Utc::now().month())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SeptemberDecember => "September - December",
            Self::JanuaryApril => "January - April",
            Self::MayAugust => "May - August",
        }
    }

    pub fn available_terms(&self) -> &'static [&'static str] {
        match self {
            Self::SeptemberDecember => &["1", "4", "7", "10"],
            Self::JanuaryApril => &["2", "5", "8"],
            Self::MayAugust => &["3", "6", "9"],
        }
    }

    pub fn offers(&self, term: &str) -> bool {
        let term = term.trim();
        self.available_terms().iter().any(|offered| *offered == term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_map_to_periods() {
        assert_eq!(AcademicPeriod::from_month(9), AcademicPeriod::SeptemberDecember);
        assert_eq!(AcademicPeriod::from_month(12), AcademicPeriod::SeptemberDecember);
        assert_eq!(AcademicPeriod::from_month(1), AcademicPeriod::JanuaryApril);
        assert_eq!(AcademicPeriod::from_month(4), AcademicPeriod::JanuaryApril);
        assert_eq!(AcademicPeriod::from_month(5), AcademicPeriod::MayAugust);
        assert_eq!(AcademicPeriod::from_month(8), AcademicPeriod::MayAugust);
    }

    #[test]
    fn periods_offer_their_terms() {
        let fall = AcademicPeriod::SeptemberDecember;
        assert_eq!(fall.available_terms(), &["1", "4", "7", "10"]);
        assert!(fall.offers("7"));
        assert!(fall.offers(" 10 "));
        assert!(!fall.offers("2"));
        assert_eq!(AcademicPeriod::MayAugust.name(), "May - August");
    }
}
