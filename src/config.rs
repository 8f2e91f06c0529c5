use crate::error::{ForecastError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Placeholder confidence reported by the curve strategy.
///
/// This is not a statistical confidence interval. No model is evaluated; the
/// value only distinguishes curve results from the deterministic profiles.
pub const CURVE_PLACEHOLDER_CONFIDENCE: f64 = 0.85;

/// Number of standard deviations a project's variance must exceed to be
/// reported as an outlier.
pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 2.0;

pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "Design",
    "Development",
    "Testing",
    "Infrastructure",
    "Consulting",
    "Hardware",
    "Software",
];

pub const DEFAULT_WORK_PACKAGES: [&str; 7] = [
    "Requirements",
    "Design",
    "Development",
    "Testing",
    "Deployment",
    "Training",
    "Support",
];

/// Every tunable the engine uses. All fields default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(description = "Allowed distance of custom percentages from 100.")]
    pub percentage_tolerance: f64,

    #[schemars(description = "Steepness of the logistic S-curve.")]
    pub curve_steepness: f64,

    #[schemars(description = "Centre of the logistic S-curve on the 0-1 timeline.")]
    pub curve_midpoint: f64,

    #[schemars(
        description = "Confidence reported with curve distributions. A fixed placeholder, not a computed score."
    )]
    pub curve_confidence: f64,

    #[schemars(
        description = "Multiplier applied to spend when a hierarchy node has no budget of its own or from its children."
    )]
    pub budget_estimate_factor: f64,

    #[schemars(
        description = "Cost categories matched case-insensitively against line item descriptions, in priority order."
    )]
    pub category_vocabulary: Vec<String>,

    pub default_category: String,

    #[schemars(
        description = "Work packages matched case-insensitively against line item descriptions, in priority order."
    )]
    pub work_package_vocabulary: Vec<String>,

    pub default_work_package: String,

    #[schemars(
        description = "Upper bounds (inclusive) of the PO number suffix for each phase. Suffixes above the last bound fall into the final phase."
    )]
    pub phase_boundaries: Vec<u64>,

    #[schemars(description = "Smallest project sample the anomaly detector will analyse.")]
    pub min_projects_for_anomalies: usize,

    pub z_score_threshold: f64,

    #[schemars(description = "Spend percentage above which a project is flagged.")]
    pub spend_velocity_threshold: f64,

    #[schemars(description = "Actuals-to-commitments ratio above which a project is flagged.")]
    pub vendor_concentration_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            percentage_tolerance: 0.01,
            curve_steepness: 10.0,
            curve_midpoint: 0.5,
            curve_confidence: CURVE_PLACEHOLDER_CONFIDENCE,
            budget_estimate_factor: 1.2,
            category_vocabulary: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            default_category: "General".to_string(),
            work_package_vocabulary: DEFAULT_WORK_PACKAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_work_package: "General Work".to_string(),
            phase_boundaries: vec![50, 100],
            min_projects_for_anomalies: 3,
            z_score_threshold: DEFAULT_Z_SCORE_THRESHOLD,
            spend_velocity_threshold: 90.0,
            vendor_concentration_ratio: 3.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(EngineConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.percentage_tolerance >= 0.0) {
            return Err(invalid(format!(
                "percentage_tolerance must be non-negative, got {}",
                self.percentage_tolerance
            )));
        }

        if !(self.curve_steepness > 0.0) {
            return Err(invalid(format!(
                "curve_steepness must be positive, got {}",
                self.curve_steepness
            )));
        }

        if !(0.0..=1.0).contains(&self.curve_midpoint) {
            return Err(invalid(format!(
                "curve_midpoint must be between 0.0 and 1.0, got {}",
                self.curve_midpoint
            )));
        }

        if !(0.0..=1.0).contains(&self.curve_confidence) {
            return Err(invalid(format!(
                "curve_confidence must be between 0.0 and 1.0, got {}",
                self.curve_confidence
            )));
        }

        if !(self.budget_estimate_factor >= 1.0) {
            return Err(invalid(format!(
                "budget_estimate_factor must be at least 1.0, got {}",
                self.budget_estimate_factor
            )));
        }

        validate_vocabulary("category_vocabulary", &self.category_vocabulary)?;
        validate_vocabulary("work_package_vocabulary", &self.work_package_vocabulary)?;

        if self.default_category.trim().is_empty() || self.default_work_package.trim().is_empty()
        {
            return Err(invalid("default buckets must not be blank".to_string()));
        }

        if self.phase_boundaries.is_empty() {
            return Err(invalid("phase_boundaries must not be empty".to_string()));
        }
        if self.phase_boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(format!(
                "phase_boundaries must be strictly increasing, got {:?}",
                self.phase_boundaries
            )));
        }

        if self.min_projects_for_anomalies < 2 {
            return Err(invalid(format!(
                "min_projects_for_anomalies must be at least 2, got {}",
                self.min_projects_for_anomalies
            )));
        }

        for (name, value) in [
            ("z_score_threshold", self.z_score_threshold),
            ("spend_velocity_threshold", self.spend_velocity_threshold),
            ("vendor_concentration_ratio", self.vendor_concentration_ratio),
        ] {
            if !(value > 0.0) {
                return Err(invalid(format!("{} must be positive, got {}", name, value)));
            }
        }

        Ok(())
    }
}

fn validate_vocabulary(name: &str, words: &[String]) -> Result<()> {
    if words.is_empty() {
        return Err(invalid(format!("{} must not be empty", name)));
    }
    if words.iter().any(|w| w.trim().is_empty()) {
        return Err(invalid(format!("{} contains a blank entry", name)));
    }
    Ok(())
}

fn invalid(details: String) -> ForecastError {
    ForecastError::InvalidConfig(details)
}
