//! Severity tiers and ranking over block metrics.
//!
//! Tiers are relative: a value is placed against the [min, max] of the rows
//! currently visible for the selected metric, not against fixed thresholds.

use std::str::FromStr;

use serde::Serialize;

use crate::types::BlockMetricRow;

/// The independently selectable numeric metrics of a block row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMetric {
    #[default]
    ShiScore,
    ClassroomHealth,
    ToiletFunctional,
    ApaarRate,
    TeacherQuality,
}

impl BlockMetric {
    pub const ALL: [BlockMetric; 5] = [
        BlockMetric::ShiScore,
        BlockMetric::ClassroomHealth,
        BlockMetric::ToiletFunctional,
        BlockMetric::ApaarRate,
        BlockMetric::TeacherQuality,
    ];

    pub fn value(self, row: &BlockMetricRow) -> f64 {
        match self {
            BlockMetric::ShiScore => row.shi_score,
            BlockMetric::ClassroomHealth => row.classroom_health,
            BlockMetric::ToiletFunctional => row.toilet_functional,
            BlockMetric::ApaarRate => row.apaar_rate,
            BlockMetric::TeacherQuality => row.teacher_quality,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            BlockMetric::ShiScore => "shi",
            BlockMetric::ClassroomHealth => "classroom_health",
            BlockMetric::ToiletFunctional => "toilet_functional",
            BlockMetric::ApaarRate => "apaar_rate",
            BlockMetric::TeacherQuality => "teacher_quality",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BlockMetric::ShiScore => "School Health Index",
            BlockMetric::ClassroomHealth => "Classroom Health",
            BlockMetric::ToiletFunctional => "Functional Toilets",
            BlockMetric::ApaarRate => "APAAR Generation",
            BlockMetric::TeacherQuality => "Teacher Quality",
        }
    }
}

impl FromStr for BlockMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        BlockMetric::ALL
            .into_iter()
            .find(|m| m.key() == s || (s == "shi_score" && *m == BlockMetric::ShiScore))
            .ok_or_else(|| {
                let keys: Vec<&str> = BlockMetric::ALL.iter().map(|m| m.key()).collect();
                format!("unknown metric '{}', expected one of: {}", s, keys.join(", "))
            })
    }
}

/// Observed [min, max] of one metric over a set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    /// `None` when there are no rows.
    pub fn of(rows: &[BlockMetricRow], metric: BlockMetric) -> Option<Self> {
        let mut values = rows.iter().map(|r| metric.value(r));
        let first = values.next()?;
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Self { min, max })
    }

    /// Position of `value` in the range. A zero-width range has no meaningful
    /// position and yields 0.0.
    pub fn ratio(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 || !span.is_finite() {
            return 0.0;
        }
        (value - self.min) / span
    }
}

/// Four discrete tiers, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SeverityTier {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.75 {
            SeverityTier::Excellent
        } else if ratio >= 0.50 {
            SeverityTier::Good
        } else if ratio >= 0.25 {
            SeverityTier::Fair
        } else {
            SeverityTier::Poor
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SeverityTier::Excellent => "#16a34a",
            SeverityTier::Good => "#84cc16",
            SeverityTier::Fair => "#f59e0b",
            SeverityTier::Poor => "#dc2626",
        }
    }
}

pub fn tier_for(value: f64, range: &MetricRange) -> SeverityTier {
    SeverityTier::from_ratio(range.ratio(value))
}

/// Rows ordered by `metric`, highest first. Equal values keep source order.
pub fn rank_by(rows: &[BlockMetricRow], metric: BlockMetric) -> Vec<&BlockMetricRow> {
    let mut ranked: Vec<&BlockMetricRow> = rows.iter().collect();
    ranked.sort_by(|a, b| metric.value(b).total_cmp(&metric.value(a)));
    ranked
}
