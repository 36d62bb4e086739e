//! Offline risk scoring over a student's aggregated integrity signals.
//!
//! Scoring is a pure function of three raw counts and never touches a live
//! session. The overall score is a capped weighted sum:
//!
//! ```text
//! score = round(clamp(baseline
//!                     + plagiarism_weight * min(plagiarism, 100)
//!                     + keystroke_weight  * min(keystroke_anomalies, keystroke_cap)
//!                     + webcam_weight     * min(webcam_alerts, webcam_cap), 0, 100))
//! ```
//!
//! Non-negative weights keep the score monotonic in every input.

pub mod report;

pub use report::{
    load_reports, ReportError, ReportInput, ReportQuery, ReportSummary, SortKey,
    StudentSignalReport,
};

use serde::{Deserialize, Serialize};

/// Scores below this are clean.
pub const SUSPICIOUS_FROM: u8 = 30;

/// Scores at or above this are flagged.
pub const FLAGGED_FROM: u8 = 70;

/// Per-signal highlight thresholds (exclusive).
pub const ELEVATED_PLAGIARISM: f64 = 50.0;
pub const ELEVATED_KEYSTROKE_ANOMALIES: u32 = 5;
pub const ELEVATED_WEBCAM_ALERTS: u32 = 3;

/// Calibrated weights for the overall risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Score contributed before any signal
    pub baseline: f64,
    /// Points per plagiarism percentage point
    pub plagiarism: f64,
    /// Points per keystroke anomaly
    pub keystroke: f64,
    /// Keystroke anomalies beyond this add nothing
    pub keystroke_cap: u32,
    /// Points per webcam alert
    pub webcam: f64,
    /// Webcam alerts beyond this add nothing
    pub webcam_cap: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            baseline: 10.0,
            plagiarism: 0.5,
            keystroke: 3.75,
            keystroke_cap: 5,
            webcam: 3.75,
            webcam_cap: 8,
        }
    }
}

impl RiskWeights {
    /// Weights must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ReportError> {
        let weights = [
            ("baseline", self.baseline),
            ("plagiarism", self.plagiarism),
            ("keystroke", self.keystroke),
            ("webcam", self.webcam),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ReportError::InvalidWeights(format!(
                    "{name} weight must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Raw signal counts for one completed exam.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalCounts {
    /// Similarity score, 0-100
    pub plagiarism_score: f64,
    pub keystroke_anomalies: u32,
    pub webcam_alerts: u32,
}

impl SignalCounts {
    pub fn new(plagiarism_score: f64, keystroke_anomalies: u32, webcam_alerts: u32) -> Self {
        Self {
            plagiarism_score,
            keystroke_anomalies,
            webcam_alerts,
        }
    }
}

/// Overall classification of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskStatus {
    Clean,
    Suspicious,
    Flagged,
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Clean => write!(f, "clean"),
            RiskStatus::Suspicious => write!(f, "suspicious"),
            RiskStatus::Flagged => write!(f, "flagged"),
        }
    }
}

impl std::str::FromStr for RiskStatus {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(RiskStatus::Clean),
            "suspicious" => Ok(RiskStatus::Suspicious),
            "flagged" => Ok(RiskStatus::Flagged),
            other => Err(ReportError::UnknownStatus(other.to_string())),
        }
    }
}

/// Map an overall score onto its status.
pub fn classify(score: u8) -> RiskStatus {
    if score < SUSPICIOUS_FROM {
        RiskStatus::Clean
    } else if score < FLAGGED_FROM {
        RiskStatus::Suspicious
    } else {
        RiskStatus::Flagged
    }
}

/// Which signals individually exceed their highlight threshold.
///
/// These never change the overall classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalFlags {
    pub plagiarism: bool,
    pub keystroke: bool,
    pub webcam: bool,
}

impl SignalFlags {
    pub fn from_counts(counts: &SignalCounts) -> Self {
        Self {
            plagiarism: counts.plagiarism_score > ELEVATED_PLAGIARISM,
            keystroke: counts.keystroke_anomalies > ELEVATED_KEYSTROKE_ANOMALIES,
            webcam: counts.webcam_alerts > ELEVATED_WEBCAM_ALERTS,
        }
    }

    pub fn any(&self) -> bool {
        self.plagiarism || self.keystroke || self.webcam
    }
}

/// Score and classification for one set of counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub overall_risk_score: u8,
    pub status: RiskStatus,
    pub flags: SignalFlags,
}

/// Stateless scorer. Shareable across threads without synchronization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskScoringEngine {
    weights: RiskWeights,
}

impl RiskScoringEngine {
    pub fn new(weights: RiskWeights) -> Result<Self, ReportError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Overall risk score in 0-100.
    pub fn score(&self, counts: &SignalCounts) -> u8 {
        let w = &self.weights;
        // NaN is treated as no signal
        let plagiarism = if counts.plagiarism_score.is_nan() {
            0.0
        } else {
            counts.plagiarism_score.clamp(0.0, 100.0)
        };
        let keystroke = counts.keystroke_anomalies.min(w.keystroke_cap) as f64;
        let webcam = counts.webcam_alerts.min(w.webcam_cap) as f64;

        let raw = w.baseline + w.plagiarism * plagiarism + w.keystroke * keystroke + w.webcam * webcam;
        raw.clamp(0.0, 100.0).round() as u8
    }

    pub fn assess(&self, counts: &SignalCounts) -> RiskAssessment {
        let overall_risk_score = self.score(counts);
        RiskAssessment {
            overall_risk_score,
            status: classify(overall_risk_score),
            flags: SignalFlags::from_counts(counts),
        }
    }
}
