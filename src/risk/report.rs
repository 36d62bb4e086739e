//! Per-student signal reports and instructor-side aggregation.

use super::{RiskScoringEngine, RiskStatus, SignalCounts, SignalFlags};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::path::Path;
use tracing::debug;

/// Reporting errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read reports: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse reports: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown status '{0}' (expected clean, suspicious or flagged)")]
    UnknownStatus(String),

    #[error("unknown sort key '{0}' (expected date, name or risk)")]
    UnknownSort(String),

    #[error("invalid risk weights: {0}")]
    InvalidWeights(String),

    #[error("{field} must be between 0 and 100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Aggregated raw counts for one completed exam, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    #[serde(default)]
    pub id: String,
    pub student_name: String,
    pub exam_title: String,
    pub exam_date: NaiveDate,
    pub plagiarism_score: f64,
    pub keystroke_anomalies: u32,
    pub webcam_alerts: u32,
    /// Minutes
    pub time_spent: u32,
    /// Percent of questions answered
    pub completion_rate: f64,
}

/// A scored report. Status always follows from the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSignalReport {
    pub id: String,
    pub student_name: String,
    pub exam_title: String,
    pub exam_date: NaiveDate,
    pub plagiarism_score: f64,
    pub keystroke_anomalies: u32,
    pub webcam_alerts: u32,
    pub overall_risk_score: u8,
    pub status: RiskStatus,
    pub time_spent: u32,
    pub completion_rate: f64,
}

impl StudentSignalReport {
    /// Score an input and derive its status.
    ///
    /// Percentages outside 0..=100 are rejected rather than clamped, so a
    /// stored report always matches the values it was scored on.
    pub fn assess(input: ReportInput, engine: &RiskScoringEngine) -> Result<Self, ReportError> {
        check_percentage("plagiarismScore", input.plagiarism_score)?;
        check_percentage("completionRate", input.completion_rate)?;

        let counts = SignalCounts::new(
            input.plagiarism_score,
            input.keystroke_anomalies,
            input.webcam_alerts,
        );
        let assessment = engine.assess(&counts);

        Ok(Self {
            id: input.id,
            student_name: input.student_name,
            exam_title: input.exam_title,
            exam_date: input.exam_date,
            plagiarism_score: input.plagiarism_score,
            keystroke_anomalies: input.keystroke_anomalies,
            webcam_alerts: input.webcam_alerts,
            overall_risk_score: assessment.overall_risk_score,
            status: assessment.status,
            time_spent: input.time_spent,
            completion_rate: input.completion_rate,
        })
    }

    pub fn counts(&self) -> SignalCounts {
        SignalCounts::new(
            self.plagiarism_score,
            self.keystroke_anomalies,
            self.webcam_alerts,
        )
    }

    /// Signals to highlight for this report.
    pub fn flags(&self) -> SignalFlags {
        SignalFlags::from_counts(&self.counts())
    }
}

fn check_percentage(field: &'static str, value: f64) -> Result<(), ReportError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ReportError::OutOfRange { field, value })
    }
}

/// Load a JSON array of report inputs and score each one.
pub fn load_reports(
    path: &Path,
    engine: &RiskScoringEngine,
) -> Result<Vec<StudentSignalReport>, ReportError> {
    let content = std::fs::read_to_string(path)?;
    let inputs: Vec<ReportInput> = serde_json::from_str(&content)?;
    debug!("Loaded {} report inputs from {:?}", inputs.len(), path);

    inputs
        .into_iter()
        .map(|input| StudentSignalReport::assess(input, engine))
        .collect()
}

/// Report ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Newest exam first
    #[default]
    Date,
    /// Student name, ascending
    Name,
    /// Highest risk first
    Risk,
}

impl std::str::FromStr for SortKey {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "name" => Ok(SortKey::Name),
            "risk" => Ok(SortKey::Risk),
            other => Err(ReportError::UnknownSort(other.to_string())),
        }
    }
}

/// Filter and sort criteria for a report listing.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    /// Case-insensitive match on student name or exam title
    pub search: Option<String>,
    pub status: Option<RiskStatus>,
    /// Exact exam title
    pub exam: Option<String>,
    pub sort: SortKey,
}

impl ReportQuery {
    pub fn matches(&self, report: &StudentSignalReport) -> bool {
        let search_ok = self.search.as_deref().map_or(true, |term| {
            let term = term.to_lowercase();
            report.student_name.to_lowercase().contains(&term)
                || report.exam_title.to_lowercase().contains(&term)
        });
        let status_ok = self.status.map_or(true, |s| report.status == s);
        let exam_ok = self
            .exam
            .as_deref()
            .map_or(true, |title| report.exam_title == title);

        search_ok && status_ok && exam_ok
    }

    /// Matching reports in the requested order.
    pub fn apply<'a>(&self, reports: &'a [StudentSignalReport]) -> Vec<&'a StudentSignalReport> {
        let mut selected: Vec<&StudentSignalReport> =
            reports.iter().filter(|r| self.matches(r)).collect();

        match self.sort {
            SortKey::Date => selected.sort_by(|a, b| b.exam_date.cmp(&a.exam_date)),
            SortKey::Name => selected.sort_by(|a, b| {
                a.student_name
                    .to_lowercase()
                    .cmp(&b.student_name.to_lowercase())
                    .then_with(|| a.student_name.cmp(&b.student_name))
            }),
            SortKey::Risk => {
                selected.sort_by(|a, b| b.overall_risk_score.cmp(&a.overall_risk_score))
            }
        }
        selected
    }
}

/// Dashboard totals over a set of reports.
///
/// Percentages and averages are rounded to whole numbers; an empty set
/// summarises to zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub clean: usize,
    pub suspicious: usize,
    pub flagged: usize,
    /// Percent of reports that are clean
    pub clean_share: u32,
    pub average_risk: u32,
    pub average_completion: u32,
    /// Minutes
    pub average_time_spent: u32,
    /// Percent of reports needing review (not clean)
    pub review_rate: u32,
}

impl ReportSummary {
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a StudentSignalReport>,
    {
        let reports: Vec<&StudentSignalReport> = reports.into_iter().collect();
        if reports.is_empty() {
            return Self::default();
        }

        let total = reports.len();
        let count = |status: RiskStatus| reports.iter().filter(|r| r.status == status).count();
        let clean = count(RiskStatus::Clean);
        let suspicious = count(RiskStatus::Suspicious);
        let flagged = count(RiskStatus::Flagged);

        let percent = |n: usize| (n as f64 / total as f64 * 100.0).round() as u32;
        let average = |values: Vec<f64>| values.iter().mean().round() as u32;

        Self {
            total,
            clean,
            suspicious,
            flagged,
            clean_share: percent(clean),
            average_risk: average(
                reports
                    .iter()
                    .map(|r| f64::from(r.overall_risk_score))
                    .collect(),
            ),
            average_completion: average(reports.iter().map(|r| r.completion_rate).collect()),
            average_time_spent: average(
                reports.iter().map(|r| f64::from(r.time_spent)).collect(),
            ),
            review_rate: percent(total - clean),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, date: &str, p: f64, k: u32, w: u32) -> ReportInput {
        ReportInput {
            id: name.to_lowercase(),
            student_name: name.to_string(),
            exam_title: "Computer Science Final".to_string(),
            exam_date: date.parse().unwrap(),
            plagiarism_score: p,
            keystroke_anomalies: k,
            webcam_alerts: w,
            time_spent: 45,
            completion_rate: 100.0,
        }
    }

    fn reports() -> Vec<StudentSignalReport> {
        let engine = RiskScoringEngine::default();
        vec![
            input("Alice Johnson", "2024-01-15", 15.0, 2, 0),
            input("bob Smith", "2024-01-17", 75.0, 8, 5),
            input("Carol Davis", "2024-01-16", 45.0, 4, 2),
        ]
        .into_iter()
        .map(|i| StudentSignalReport::assess(i, &engine).unwrap())
        .collect()
    }

    fn names(selected: &[&StudentSignalReport]) -> Vec<String> {
        selected.iter().map(|r| r.student_name.clone()).collect()
    }

    #[test]
    fn test_assess_derives_status() {
        let reports = reports();
        assert_eq!(reports[0].overall_risk_score, 25);
        assert_eq!(reports[0].status, RiskStatus::Clean);
        assert_eq!(reports[1].status, RiskStatus::Flagged);
        assert!(reports[1].flags().plagiarism);
        assert!(reports[1].flags().any());
        assert!(!reports[0].flags().any());
        assert_eq!(reports[2].status, RiskStatus::Suspicious);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let reports = reports();
        let query = ReportQuery {
            search: Some("CAROL".to_string()),
            ..Default::default()
        };
        assert_eq!(names(&query.apply(&reports)), vec!["Carol Davis"]);

        let query = ReportQuery {
            search: Some("science".to_string()),
            ..Default::default()
        };
        assert_eq!(query.apply(&reports).len(), 3);
    }

    #[test]
    fn test_status_and_exam_filters() {
        let reports = reports();
        let query = ReportQuery {
            status: Some(RiskStatus::Flagged),
            ..Default::default()
        };
        assert_eq!(names(&query.apply(&reports)), vec!["bob Smith"]);

        let query = ReportQuery {
            exam: Some("Physics".to_string()),
            ..Default::default()
        };
        assert!(query.apply(&reports).is_empty());
    }

    #[test]
    fn test_sort_orders() {
        let reports = reports();

        let by_date = ReportQuery::default();
        assert_eq!(
            names(&by_date.apply(&reports)),
            vec!["bob Smith", "Carol Davis", "Alice Johnson"]
        );

        let by_name = ReportQuery {
            sort: SortKey::Name,
            ..Default::default()
        };
        assert_eq!(
            names(&by_name.apply(&reports)),
            vec!["Alice Johnson", "bob Smith", "Carol Davis"]
        );

        let by_risk = ReportQuery {
            sort: SortKey::Risk,
            ..Default::default()
        };
        let scores: Vec<u8> = by_risk
            .apply(&reports)
            .iter()
            .map(|r| r.overall_risk_score)
            .collect();
        assert_eq!(scores, vec![85, 55, 25]);
    }

    #[test]
    fn test_summary() {
        let reports = reports();
        let summary = ReportSummary::from_reports(&reports);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.clean, 1);
        assert_eq!(summary.suspicious, 1);
        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.clean_share, 33);
        assert_eq!(summary.review_rate, 67);
        assert_eq!(summary.average_risk, 55);
        assert_eq!(summary.average_completion, 100);
        assert_eq!(summary.average_time_spent, 45);
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let empty: Vec<StudentSignalReport> = Vec::new();
        let summary = ReportSummary::from_reports(&empty);
        assert_eq!(summary, ReportSummary::default());
    }

    #[test]
    fn test_load_reports_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");
        let json = r#"[{
            "studentName": "Dana",
            "examTitle": "Algebra",
            "examDate": "2024-02-01",
            "plagiarismScore": 45,
            "keystrokeAnomalies": 4,
            "webcamAlerts": 2,
            "timeSpent": 50,
            "completionRate": 95
        }]"#;
        std::fs::write(&path, json).unwrap();

        let reports = load_reports(&path, &RiskScoringEngine::default()).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].overall_risk_score, 55);
        assert_eq!(reports[0].id, "");
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("Risk".parse::<SortKey>().unwrap(), SortKey::Risk);
        assert!(matches!(
            "size".parse::<SortKey>(),
            Err(ReportError::UnknownSort(_))
        ));
    }

    #[test]
    fn test_out_of_range_percentages_rejected() {
        let engine = RiskScoringEngine::default();

        for p in [150.0, -5.0, f64::NAN] {
            let result = StudentSignalReport::assess(input("Eve", "2024-01-20", p, 0, 0), &engine);
            assert!(matches!(
                result,
                Err(ReportError::OutOfRange {
                    field: "plagiarismScore",
                    ..
                })
            ));
        }

        let mut over = input("Eve", "2024-01-20", 10.0, 0, 0);
        over.completion_rate = 101.0;
        assert!(matches!(
            StudentSignalReport::assess(over, &engine),
            Err(ReportError::OutOfRange {
                field: "completionRate",
                ..
            })
        ));

        let edge = StudentSignalReport::assess(input("Eve", "2024-01-20", 100.0, 0, 0), &engine)
            .unwrap();
        assert_eq!(edge.plagiarism_score, 100.0);
    }

    #[test]
    fn test_load_reports_rejects_bad_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");
        let json = r#"[{
            "studentName": "Dana",
            "examTitle": "Algebra",
            "examDate": "2024-02-01",
            "plagiarismScore": 150,
            "keystrokeAnomalies": 0,
            "webcamAlerts": 0,
            "timeSpent": 50,
            "completionRate": 95
        }]"#;
        std::fs::write(&path, json).unwrap();

        let result = load_reports(&path, &RiskScoringEngine::default());
        assert!(matches!(result, Err(ReportError::OutOfRange { .. })));
    }
}
