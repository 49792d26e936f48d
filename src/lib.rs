//! Risk scoring and session-history analysis for student tutoring records.
//!
//! [`risk::RiskScorer`] turns a student's sessions plus externally counted
//! absences and low-grade incidents into a score and tier.
//! [`history::HistoryAnalyzer`] groups the same sessions by term and reports
//! recurring reasons, the trend between the latest terms, and alerts.
//! Both are pure; [`db`] and [`report`] are the surrounding plumbing used by
//! the command-line tool.

pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod models;
pub mod reasons;
pub mod report;
pub mod risk;
pub mod students;
pub mod terms;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use history::HistoryAnalyzer;
pub use risk::RiskScorer;
