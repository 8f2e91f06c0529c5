use crate::config::EngineConfig;
use crate::schema::{AnomalyDetails, AnomalyRecord, AnomalyType, ProjectSnapshot, Severity};
use crate::utils::mean_and_std_dev;
use log::{debug, info, warn};

/// Cross-project scan for budget anomalies.
///
/// Three independent checks run over the whole sample and each contributes
/// its own records; a project can appear once per check.
pub struct AnomalyDetector<'a> {
    config: &'a EngineConfig,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Records sorted by severity (critical first), then by descending
    /// confidence. Samples smaller than `min_projects_for_anomalies` yield
    /// nothing.
    pub fn detect(&self, projects: &[ProjectSnapshot]) -> Vec<AnomalyRecord> {
        if projects.len() < self.config.min_projects_for_anomalies {
            debug!(
                "Skipping anomaly scan: {} projects, need at least {}",
                projects.len(),
                self.config.min_projects_for_anomalies
            );
            return Vec::new();
        }

        let mut records = self.variance_outliers(projects);
        records.extend(self.spend_velocity(projects));
        records.extend(self.vendor_concentration(projects));

        records.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });

        info!(
            "Anomaly scan over {} projects found {} anomalies",
            projects.len(),
            records.len()
        );
        records
    }

    /// Projects with a non-finite variance take no part in the statistics
    /// and are never flagged.
    pub fn variance_outliers(&self, projects: &[ProjectSnapshot]) -> Vec<AnomalyRecord> {
        let scored: Vec<&ProjectSnapshot> = projects
            .iter()
            .filter(|p| {
                if p.variance.is_finite() {
                    return true;
                }
                warn!(
                    "Variance outlier check skipped for {}: variance is {}",
                    p.project_id, p.variance
                );
                false
            })
            .collect();

        let variances: Vec<f64> = scored.iter().map(|p| p.variance).collect();
        let (mean, std_dev) = mean_and_std_dev(&variances);

        if !std_dev.is_finite() || std_dev <= f64::EPSILON {
            debug!(
                "Variance outlier check skipped: standard deviation is {}",
                std_dev
            );
            return Vec::new();
        }

        let threshold = self.config.z_score_threshold;
        scored
            .into_iter()
            .filter_map(|project| {
                let z_score = (project.variance - mean) / std_dev;
                if z_score.abs() <= threshold {
                    return None;
                }

                let magnitude = z_score.abs();
                let severity = if magnitude >= threshold + 1.0 {
                    Severity::Critical
                } else if magnitude >= threshold + 0.5 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let direction = if z_score < 0.0 { "below" } else { "above" };

                Some(AnomalyRecord {
                    project_id: project.project_id.clone(),
                    anomaly_type: AnomalyType::VarianceOutlier,
                    severity,
                    confidence: (0.5 + (magnitude - threshold) * 0.25).min(0.99),
                    description: format!(
                        "{} variance {:.2} is {:.1} standard deviations {} the portfolio mean",
                        display_name(project),
                        project.variance,
                        magnitude,
                        direction
                    ),
                    details: AnomalyDetails::VarianceOutlier {
                        variance: project.variance,
                        mean,
                        std_dev,
                        z_score,
                    },
                })
            })
            .collect()
    }

    pub fn spend_velocity(&self, projects: &[ProjectSnapshot]) -> Vec<AnomalyRecord> {
        let threshold = self.config.spend_velocity_threshold;
        projects
            .iter()
            .filter(|p| p.spend_percentage > threshold)
            .map(|project| {
                let severity = if project.spend_percentage > 100.0 {
                    Severity::Critical
                } else if project.spend_percentage > 95.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };

                AnomalyRecord {
                    project_id: project.project_id.clone(),
                    anomaly_type: AnomalyType::SpendVelocity,
                    severity,
                    confidence: (project.spend_percentage / 100.0).min(1.0),
                    description: format!(
                        "{} has spent {:.1}% of its budget",
                        display_name(project),
                        project.spend_percentage
                    ),
                    details: AnomalyDetails::SpendVelocity {
                        spend_percentage: project.spend_percentage,
                        threshold,
                    },
                }
            })
            .collect()
    }

    pub fn vendor_concentration(&self, projects: &[ProjectSnapshot]) -> Vec<AnomalyRecord> {
        let threshold = self.config.vendor_concentration_ratio;
        projects
            .iter()
            .filter_map(|project| {
                if project.total_commitments == 0.0 {
                    debug!(
                        "Vendor concentration check skipped for {}: no commitments",
                        project.project_id
                    );
                    return None;
                }

                let ratio = project.total_actuals / project.total_commitments;
                if ratio <= threshold {
                    return None;
                }

                let severity = if ratio > threshold * 2.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };

                Some(AnomalyRecord {
                    project_id: project.project_id.clone(),
                    anomaly_type: AnomalyType::VendorConcentration,
                    severity,
                    confidence: 0.8,
                    description: format!(
                        "{} actuals are {:.1}x its commitments",
                        display_name(project),
                        ratio
                    ),
                    details: AnomalyDetails::VendorConcentration {
                        total_actuals: project.total_actuals,
                        total_commitments: project.total_commitments,
                        ratio,
                        threshold,
                    },
                })
            })
            .collect()
    }
}

pub fn detect_anomalies(projects: &[ProjectSnapshot]) -> Vec<AnomalyRecord> {
    AnomalyDetector::new(&EngineConfig::default()).detect(projects)
}

fn display_name(project: &ProjectSnapshot) -> &str {
    project
        .project_name
        .as_deref()
        .unwrap_or(project.project_id.as_str())
}
