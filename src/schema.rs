use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Granularity {
    #[schemars(description = "Seven-day periods starting on the range start date.")]
    Week,

    #[schemars(
        description = "Calendar-month periods. Boundaries advance one month at a time, clamping to the last day of shorter months."
    )]
    Month,
}

/// A contiguous slice of a date range. `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
    pub amount: f64,
    /// Share of the distributed total, 0-100.
    pub percentage: f64,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ProfileKind {
    Linear,
    Custom,
    Curve,
}

/// The allocation policy requested by a caller, with the data each policy needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "profile")]
pub enum DistributionProfile {
    #[schemars(description = "Every period receives an equal share of the total.")]
    Linear,

    #[schemars(
        description = "Caller-supplied percentages, one per period in period order, summing to 100."
    )]
    Custom {
        #[schemars(description = "Percentage per period (0-100).")]
        percentages: Vec<f64>,
    },

    #[schemars(
        description = "Curve-shaped distribution. A historical spend pattern of the same length as the periods is used as a template; otherwise an S-curve is synthesised."
    )]
    Curve {
        #[serde(default)]
        #[schemars(description = "Optional historical spend per period, any scale.")]
        history: Option<Vec<f64>>,
    },
}

impl DistributionProfile {
    pub fn kind(&self) -> ProfileKind {
        match self {
            DistributionProfile::Linear => ProfileKind::Linear,
            DistributionProfile::Custom { .. } => ProfileKind::Custom,
            DistributionProfile::Curve { .. } => ProfileKind::Curve,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DistributionRequest {
    #[schemars(description = "Total budget to distribute across the periods.")]
    pub total_budget: f64,

    #[schemars(description = "First day of the range (inclusive), YYYY-MM-DD.")]
    pub start_date: NaiveDate,

    #[schemars(description = "End of the range (exclusive), YYYY-MM-DD.")]
    pub end_date: NaiveDate,

    #[schemars(description = "Period size used to partition the range.")]
    pub granularity: Granularity,

    #[schemars(description = "How the total is spread over the periods.")]
    pub profile: DistributionProfile,
}

impl DistributionRequest {
    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(DistributionRequest);
        serde_json::to_string_pretty(&schema)
    }
}

/// Output of every allocation strategy.
///
/// A failed allocation carries `error` and a zero `total`. Strategies return no
/// periods on failure; the reprofiler returns the input periods zeroed so the
/// caller can still render the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub periods: Vec<Period>,
    pub total: f64,
    pub profile: ProfileKind,
    /// Only set by the curve strategy.
    pub confidence: Option<f64>,
    pub error: Option<ForecastError>,
}

impl DistributionResult {
    pub fn success(periods: Vec<Period>, total: f64, profile: ProfileKind) -> Self {
        Self {
            periods,
            total,
            profile,
            confidence: None,
            error: None,
        }
    }

    pub fn failure(profile: ProfileKind, error: ForecastError) -> Self {
        Self {
            periods: Vec::new(),
            total: 0.0,
            profile,
            confidence: None,
            error: Some(error),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<DistributionResult> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    pub fn period_sum(&self) -> f64 {
        self.periods.iter().map(|p| p.amount).sum()
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        (self.period_sum() - self.total).abs() <= tolerance
    }
}

/// A financial commitment (purchase order) or actual recorded against a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    #[schemars(description = "Project the commitment is booked against.")]
    pub project_id: String,

    pub vendor_id: String,

    pub vendor_name: String,

    #[schemars(
        description = "Purchase order number. Its trailing digits drive the work-breakdown phase."
    )]
    pub po_number: String,

    #[schemars(
        description = "Free text. Scanned for category and work-package keywords."
    )]
    pub description: String,

    pub amount: f64,

    pub issue_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    /// 0 for roots.
    pub level: usize,
    /// Lookup aid only; ownership runs parent to children.
    pub parent_id: Option<String>,
    pub currency: String,
    pub total_budget: f64,
    pub total_spend: f64,
    pub variance: f64,
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TargetSchema {
    #[schemars(description = "Purchase orders and other financial commitments.")]
    Commitment,

    #[schemars(description = "Invoices and other realised spend.")]
    Actual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSuggestion {
    pub source_header: String,
    pub target_column: String,
    pub confidence: f64,
}

/// Per-project financial summary fed to the anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectSnapshot {
    pub project_id: String,

    #[serde(default)]
    pub project_name: Option<String>,

    pub budget: f64,

    pub total_commitments: f64,

    pub total_actuals: f64,

    #[schemars(description = "Budget minus spend. Positive means under budget.")]
    pub variance: f64,

    #[schemars(description = "Spend as a percentage of budget (0-100+).")]
    pub spend_percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AnomalyType {
    VarianceOutlier,
    SpendVelocity,
    VendorConcentration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnomalyDetails {
    VarianceOutlier {
        variance: f64,
        mean: f64,
        std_dev: f64,
        z_score: f64,
    },
    SpendVelocity {
        spend_percentage: f64,
        threshold: f64,
    },
    VendorConcentration {
        total_actuals: f64,
        total_commitments: f64,
        ratio: f64,
        threshold: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub project_id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub details: AnomalyDetails,
}
