//! Batch culling results

use crate::error::QualityError;
use crate::score::{PickLabel, QualityReport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome for one file of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub label: PickLabel,
    pub report: Option<QualityReport>,
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn assessed(path: &Path, report: QualityReport) -> Self {
        Self {
            path: path.to_path_buf(),
            label: report.label,
            report: Some(report),
            error: None,
        }
    }

    pub fn failed(path: &Path, error: &QualityError) -> Self {
        Self {
            path: path.to_path_buf(),
            label: PickLabel::NoPick,
            report: None,
            error: Some(error.to_string()),
        }
    }

    pub fn final_quality(&self) -> f64 {
        self.report.as_ref().map(|r| r.final_quality).unwrap_or(0.0)
    }
}

/// Label counts over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub accepted: usize,
    pub pending: usize,
    pub rejected: usize,
    pub no_pick: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.entries.len(),
            ..BatchSummary::default()
        };

        for entry in &self.entries {
            match entry.label {
                PickLabel::Accepted => summary.accepted += 1,
                PickLabel::Pending => summary.pending += 1,
                PickLabel::Rejected => summary.rejected += 1,
                PickLabel::NoPick => summary.no_pick += 1,
            }
            if entry.error.is_some() {
                summary.failed += 1;
            }
        }

        summary
    }

    /// Highest-quality entry that received a label. Ties go to the sharper image.
    pub fn best_pick(&self) -> Option<&BatchEntry> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.report {
                Some(report) if entry.label != PickLabel::NoPick => Some((entry, report)),
                _ => None,
            })
            .max_by(|(_, a), (_, b)| a.compare(b))
            .map(|(entry, _)| entry)
    }

    /// Entries carrying the given label
    pub fn with_label(&self, label: PickLabel) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(move |e| e.label == label)
    }
}
