use crate::config::EngineConfig;
use crate::error::ForecastError;
use crate::profiles::{curve_percentages, CurveSource};
use crate::schema::{DistributionProfile, DistributionResult, Period, ProfileKind};
use chrono::NaiveDate;
use log::{debug, warn};

/// Spreads a total across periods. Inputs are never mutated; every call
/// returns freshly cloned periods.
pub struct Allocator<'a> {
    config: &'a EngineConfig,
}

impl<'a> Allocator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn allocate(
        &self,
        total: f64,
        periods: &[Period],
        profile: &DistributionProfile,
    ) -> DistributionResult {
        match profile {
            DistributionProfile::Linear => self.linear(total, periods),
            DistributionProfile::Custom { percentages } => {
                self.custom(total, periods, percentages)
            }
            DistributionProfile::Curve { history } => {
                self.curve(total, periods, history.as_deref())
            }
        }
    }

    pub fn linear(&self, total: f64, periods: &[Period]) -> DistributionResult {
        if periods.is_empty() {
            return failed(ProfileKind::Linear, ForecastError::NoPeriodsAvailable);
        }

        let count = periods.len() as f64;
        let share = total / count;
        let percentage = 100.0 / count;

        let allocated = periods
            .iter()
            .map(|p| Period {
                amount: share,
                percentage,
                ..p.clone()
            })
            .collect();

        DistributionResult::success(allocated, total, ProfileKind::Linear)
    }

    pub fn custom(&self, total: f64, periods: &[Period], percentages: &[f64]) -> DistributionResult {
        if periods.is_empty() {
            return failed(ProfileKind::Custom, ForecastError::NoPeriodsAvailable);
        }

        if percentages.len() != periods.len() {
            return failed(
                ProfileKind::Custom,
                ForecastError::PercentageCountMismatch {
                    expected: periods.len(),
                    got: percentages.len(),
                },
            );
        }

        let sum: f64 = percentages.iter().sum();
        if !((sum - 100.0).abs() <= self.config.percentage_tolerance) {
            return failed(ProfileKind::Custom, ForecastError::PercentageSumInvalid(sum));
        }

        DistributionResult::success(
            apply_percentages(total, periods, percentages),
            total,
            ProfileKind::Custom,
        )
    }

    /// Curve-shaped allocation. The reported confidence is the configured
    /// placeholder; no forecasting model is evaluated.
    pub fn curve(&self, total: f64, periods: &[Period], history: Option<&[f64]>) -> DistributionResult {
        if periods.is_empty() {
            return failed(ProfileKind::Curve, ForecastError::NoPeriodsAvailable);
        }

        let (percentages, source) = curve_percentages(periods.len(), history, self.config);
        debug!(
            "Curve allocation over {} periods using {}",
            periods.len(),
            match source {
                CurveSource::Historical => "historical pattern",
                CurveSource::SCurve => "S-curve",
            }
        );

        DistributionResult::success(
            apply_percentages(total, periods, &percentages),
            total,
            ProfileKind::Curve,
        )
        .with_confidence(self.config.curve_confidence)
    }

    /// Spreads the unspent remainder evenly over periods starting on or after
    /// `now`. Earlier periods are zeroed. The redistribution is always linear,
    /// whatever profile produced the original plan.
    pub fn reprofile(
        &self,
        total: f64,
        spent_to_date: f64,
        periods: &[Period],
        now: NaiveDate,
    ) -> DistributionResult {
        if periods.is_empty() {
            return failed(ProfileKind::Linear, ForecastError::NoPeriodsAvailable);
        }

        let remaining = total - spent_to_date;
        if remaining <= 0.0 {
            return zeroed(periods, ForecastError::BudgetFullyConsumed);
        }

        let future_count = periods.iter().filter(|p| p.start >= now).count();
        if future_count == 0 {
            return zeroed(periods, ForecastError::NoRemainingPeriods);
        }

        let share = remaining / future_count as f64;
        let percentage = 100.0 / future_count as f64;

        let reprofiled = periods
            .iter()
            .map(|p| {
                if p.start >= now {
                    Period {
                        amount: share,
                        percentage,
                        ..p.clone()
                    }
                } else {
                    Period {
                        amount: 0.0,
                        percentage: 0.0,
                        ..p.clone()
                    }
                }
            })
            .collect();

        debug!(
            "Reprofiled {:.2} remaining over {} of {} periods from {}",
            remaining,
            future_count,
            periods.len(),
            now
        );
        DistributionResult::success(reprofiled, remaining, ProfileKind::Linear)
    }
}

/// Sum of squared deviations of each period's percentage from an even split.
/// Zero for a linear distribution and for an empty one.
pub fn variance_metric(result: &DistributionResult) -> f64 {
    if result.periods.is_empty() {
        return 0.0;
    }
    let equal_share = 100.0 / result.periods.len() as f64;
    result
        .periods
        .iter()
        .map(|p| (p.percentage - equal_share).powi(2))
        .sum()
}

pub fn apply_linear(total: f64, periods: &[Period]) -> DistributionResult {
    Allocator::new(&EngineConfig::default()).linear(total, periods)
}

pub fn apply_custom(total: f64, periods: &[Period], percentages: &[f64]) -> DistributionResult {
    Allocator::new(&EngineConfig::default()).custom(total, periods, percentages)
}

pub fn apply_curve(total: f64, periods: &[Period], history: Option<&[f64]>) -> DistributionResult {
    Allocator::new(&EngineConfig::default()).curve(total, periods, history)
}

pub fn reprofile(
    total: f64,
    spent_to_date: f64,
    periods: &[Period],
    now: NaiveDate,
) -> DistributionResult {
    Allocator::new(&EngineConfig::default()).reprofile(total, spent_to_date, periods, now)
}

fn apply_percentages(total: f64, periods: &[Period], percentages: &[f64]) -> Vec<Period> {
    periods
        .iter()
        .zip(percentages)
        .map(|(p, pct)| Period {
            amount: total * pct / 100.0,
            percentage: *pct,
            ..p.clone()
        })
        .collect()
}

fn failed(profile: ProfileKind, error: ForecastError) -> DistributionResult {
    warn!("{:?} allocation failed: {}", profile, error);
    DistributionResult::failure(profile, error)
}

fn zeroed(periods: &[Period], error: ForecastError) -> DistributionResult {
    warn!("Reprofile produced an empty plan: {}", error);
    let periods = periods
        .iter()
        .map(|p| Period {
            amount: 0.0,
            percentage: 0.0,
            ..p.clone()
        })
        .collect();

    DistributionResult {
        periods,
        total: 0.0,
        profile: ProfileKind::Linear,
        confidence: None,
        error: Some(error),
    }
}
