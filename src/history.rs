use crate::error::{ForecastError, Result};
use crate::schema::{DistributionResult, Period, ProfileKind};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateSnapshot {
    pub recorded_on: NaiveDate,
    pub total: f64,
    pub profile: ProfileKind,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateChange {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub previous_total: f64,
    pub new_total: f64,
    pub delta: f64,
    /// `None` when the previous total was zero.
    pub delta_percent: Option<f64>,
}

/// Cost estimates recorded per project over time. Owned by the caller; there
/// is no shared instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimateHistory {
    projects: BTreeMap<String, Vec<EstimateSnapshot>>,
}

impl EstimateHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a successful distribution. Snapshots are kept ordered by date;
    /// estimates recorded on the same day keep insertion order.
    pub fn record(
        &mut self,
        project_id: &str,
        result: &DistributionResult,
        recorded_on: NaiveDate,
    ) -> Result<&EstimateSnapshot> {
        if let Some(err) = &result.error {
            return Err(err.clone());
        }

        let snapshots = self.projects.entry(project_id.to_string()).or_default();
        snapshots.push(EstimateSnapshot {
            recorded_on,
            total: result.total,
            profile: result.profile,
            periods: result.periods.clone(),
        });
        snapshots.sort_by_key(|s| s.recorded_on);

        debug!(
            "Recorded estimate {:.2} for {} on {} ({} on file)",
            result.total,
            project_id,
            recorded_on,
            snapshots.len()
        );

        let position = snapshots
            .iter()
            .rposition(|s| s.recorded_on == recorded_on)
            .unwrap_or(snapshots.len() - 1);
        Ok(&snapshots[position])
    }

    pub fn snapshots(&self, project_id: &str) -> Result<&[EstimateSnapshot]> {
        self.projects
            .get(project_id)
            .map(|s| s.as_slice())
            .ok_or_else(|| ForecastError::ProjectNotFound(project_id.to_string()))
    }

    pub fn latest(&self, project_id: &str) -> Result<&EstimateSnapshot> {
        self.snapshots(project_id)?
            .last()
            .ok_or_else(|| ForecastError::ProjectNotFound(project_id.to_string()))
    }

    pub fn changes(&self, project_id: &str) -> Result<Vec<EstimateChange>> {
        let snapshots = self.snapshots(project_id)?;
        Ok(snapshots
            .windows(2)
            .map(|pair| {
                let (before, after) = (&pair[0], &pair[1]);
                let delta = after.total - before.total;
                EstimateChange {
                    from: before.recorded_on,
                    to: after.recorded_on,
                    previous_total: before.total,
                    new_total: after.total,
                    delta,
                    delta_percent: (before.total != 0.0).then(|| delta / before.total * 100.0),
                }
            })
            .collect())
    }

    pub fn clear(&mut self, project_id: &str) -> Result<()> {
        self.projects
            .remove(project_id)
            .map(|_| ())
            .ok_or_else(|| ForecastError::ProjectNotFound(project_id.to_string()))
    }

    pub fn project_ids(&self) -> Vec<&str> {
        self.projects.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{apply_custom, apply_linear};
    use crate::periods::partition;
    use crate::schema::Granularity;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn periods() -> Vec<Period> {
        partition(date(2024, 1, 1), date(2024, 3, 1), Granularity::Month)
    }

    #[test]
    fn test_record_and_latest() {
        let mut history = EstimateHistory::new();
        history
            .record("P1", &apply_linear(1000.0, &periods()), date(2024, 1, 5))
            .unwrap();
        let latest = history
            .record("P1", &apply_linear(1500.0, &periods()), date(2024, 2, 5))
            .unwrap();
        assert_eq!(latest.total, 1500.0);

        assert_eq!(history.latest("P1").unwrap().total, 1500.0);
        assert_eq!(history.snapshots("P1").unwrap().len(), 2);
        assert_eq!(history.project_ids(), vec!["P1"]);
    }

    #[test]
    fn test_out_of_order_records_are_sorted() {
        let mut history = EstimateHistory::new();
        history
            .record("P1", &apply_linear(2000.0, &periods()), date(2024, 3, 1))
            .unwrap();
        history
            .record("P1", &apply_linear(1000.0, &periods()), date(2024, 1, 1))
            .unwrap();
        assert_eq!(history.latest("P1").unwrap().recorded_on, date(2024, 3, 1));
    }

    #[test]
    fn test_failed_result_is_rejected() {
        let mut history = EstimateHistory::new();
        let failed = apply_custom(1000.0, &periods(), &[10.0, 10.0]);
        let err = history.record("P1", &failed, date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, ForecastError::PercentageSumInvalid(_)));
        assert!(history.project_ids().is_empty());
    }

    #[test]
    fn test_unknown_project() {
        let mut history = EstimateHistory::new();
        assert_eq!(
            history.latest("NOPE").unwrap_err(),
            ForecastError::ProjectNotFound("NOPE".to_string())
        );
        assert!(history.changes("NOPE").is_err());
        assert!(history.clear("NOPE").is_err());
    }

    #[test]
    fn test_changes() {
        let mut history = EstimateHistory::new();
        for (total, day) in [(1000.0, 1), (1250.0, 2), (0.0, 3), (500.0, 4)] {
            history
                .record("P1", &apply_linear(total, &periods()), date(2024, 1, day))
                .unwrap();
        }

        let changes = history.changes("P1").unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].delta, 250.0);
        assert_eq!(changes[0].delta_percent, Some(25.0));
        assert_eq!(changes[1].delta, -1250.0);
        assert_eq!(changes[2].delta_percent, None);
    }

    #[test]
    fn test_clear() {
        let mut history = EstimateHistory::new();
        history
            .record("P1", &apply_linear(1000.0, &periods()), date(2024, 1, 1))
            .unwrap();
        history.clear("P1").unwrap();
        assert!(history.snapshots("P1").is_err());
    }
}
