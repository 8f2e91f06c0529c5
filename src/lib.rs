//! # Cost Forecast Engine
//!
//! Computational core of a project cost-management tool: splits a budget over
//! weekly or monthly periods, reprofiles the unspent remainder, rolls line items
//! up into cost hierarchies, maps import headers onto the internal columns and
//! flags anomalous projects across a portfolio.
//!
//! ## Core Concepts
//!
//! - **Periods**: Contiguous half-open date slices produced by [`periods::partition`]
//! - **Profiles**: Linear, custom percentages or an S-curve/historical shape
//! - **Conservation**: A successful distribution always sums to its total
//! - **Reprofiling**: Remaining budget spread evenly over the periods not yet started
//! - **Hierarchies**: Cost element and work breakdown trees with budget/spend/variance
//!
//! ## Example
//!
//! ```rust
//! use cost_forecast_engine::*;
//! use chrono::NaiveDate;
//!
//! let request = DistributionRequest {
//!     total_budget: 1200.0,
//!     start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     end_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
//!     granularity: Granularity::Month,
//!     profile: DistributionProfile::Linear,
//! };
//!
//! let result = calculate_distribution(&request);
//! assert!(result.is_ok());
//! assert_eq!(result.periods.len(), 3);
//! assert_eq!(result.periods[0].amount, 400.0);
//! ```

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod history;
pub mod mapping;
pub mod periods;
pub mod profiles;
pub mod schema;
pub mod utils;

pub use anomaly::{detect_anomalies, AnomalyDetector};
pub use config::EngineConfig;
pub use engine::{apply_curve, apply_custom, apply_linear, reprofile, variance_metric, Allocator};
pub use error::{ForecastError, Result};
pub use hierarchy::{
    build_cost_element_tree, build_work_breakdown_tree, find_node, flatten_tree, forest_totals,
    node_path, FlatNode, HierarchyBuilder, HierarchyTotals,
};
pub use history::{EstimateChange, EstimateHistory, EstimateSnapshot};
pub use mapping::{detect_mapping, missing_required, MappingTemplate, MappingTemplateStore};
pub use periods::partition;
pub use schema::*;

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// How evenly one profile spreads a request's budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileComparison {
    pub profile: ProfileKind,
    /// See [`engine::variance_metric`]. Lower is more even.
    pub variance_metric: f64,
    pub result: DistributionResult,
}

#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: EngineConfig,
}

impl ForecastEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calculate(&self, request: &DistributionRequest) -> DistributionResult {
        info!(
            "Distributing {:.2} from {} to {} using {:?} profile",
            request.total_budget,
            request.start_date,
            request.end_date,
            request.profile.kind()
        );

        let periods = partition(request.start_date, request.end_date, request.granularity);
        debug!("Partitioned range into {} periods", periods.len());

        Allocator::new(&self.config).allocate(request.total_budget, &periods, &request.profile)
    }

    /// Partitions the request's range and spreads `total_budget - spent_to_date`
    /// over the periods starting on or after `now`. The request's profile is
    /// ignored.
    pub fn reprofile(
        &self,
        request: &DistributionRequest,
        spent_to_date: f64,
        now: NaiveDate,
    ) -> DistributionResult {
        info!(
            "Reprofiling {:.2} with {:.2} spent as of {}",
            request.total_budget, spent_to_date, now
        );

        let periods = partition(request.start_date, request.end_date, request.granularity);
        Allocator::new(&self.config).reprofile(request.total_budget, spent_to_date, &periods, now)
    }

    /// Runs the linear and curve strategies, plus the request's own custom
    /// percentages when it carries them, over the same periods. Sorted most even
    /// first. Failed allocations are left out.
    pub fn compare_profiles(&self, request: &DistributionRequest) -> Vec<ProfileComparison> {
        let periods = partition(request.start_date, request.end_date, request.granularity);
        let allocator = Allocator::new(&self.config);

        let history = match &request.profile {
            DistributionProfile::Curve { history } => history.as_deref(),
            _ => None,
        };

        let mut results = vec![
            allocator.linear(request.total_budget, &periods),
            allocator.curve(request.total_budget, &periods, history),
        ];
        if let DistributionProfile::Custom { percentages } = &request.profile {
            results.push(allocator.custom(request.total_budget, &periods, percentages));
        }

        let mut comparisons: Vec<ProfileComparison> = results
            .into_iter()
            .filter_map(|result| {
                if let Some(err) = &result.error {
                    warn!("{:?} profile left out of comparison: {}", result.profile, err);
                    return None;
                }
                Some(ProfileComparison {
                    profile: result.profile,
                    variance_metric: variance_metric(&result),
                    result,
                })
            })
            .collect();

        comparisons.sort_by(|a, b| a.variance_metric.total_cmp(&b.variance_metric));
        comparisons
    }

    pub fn cost_element_tree(&self, items: &[LineItem], currency: &str) -> Vec<HierarchyNode> {
        HierarchyBuilder::new(&self.config).build_cost_element_tree(items, currency)
    }

    pub fn work_breakdown_tree(&self, items: &[LineItem], currency: &str) -> Vec<HierarchyNode> {
        HierarchyBuilder::new(&self.config).build_work_breakdown_tree(items, currency)
    }

    pub fn detect_anomalies(&self, projects: &[ProjectSnapshot]) -> Vec<AnomalyRecord> {
        AnomalyDetector::new(&self.config).detect(projects)
    }
}

pub fn calculate_distribution(request: &DistributionRequest) -> DistributionResult {
    ForecastEngine::default().calculate(request)
}
