//! Repository health scoring

use std::collections::HashMap;

use launchpad_models::{FailureTrend, HealthScoreResponse};

use crate::deploy::fsm::DeploymentStatus;
use crate::models::deployment::DeploymentRecord;
use crate::recovery::analyzer::{ErrorAnalyzer, ErrorCategory};

/// Average duration above which the score is penalized
const SLOW_DEPLOY_SECS: f64 = 300.0;
const MAX_DURATION_PENALTY: f64 = 20.0;
const CONCENTRATION_PENALTY: f64 = 10.0;

/// Score `records`, all of which belong to one repository and window.
///
/// An empty window scores 100.
pub fn score(
    repository_id: &str,
    window_days: u32,
    records: &[DeploymentRecord],
    analyzer: &ErrorAnalyzer,
) -> HealthScoreResponse {
    let mut report = HealthScoreResponse {
        repository_id: repository_id.to_string(),
        window_days,
        score: 100,
        total_deployments: records.len(),
        success_rate: 0.0,
        avg_duration_secs: 0.0,
        failure_trends: Vec::new(),
        recommendations: Vec::new(),
    };
    if records.is_empty() {
        report.recommendations.push(format!(
            "No deployments in the last {window_days} days"
        ));
        return report;
    }

    let successful = records
        .iter()
        .filter(|r| r.status == DeploymentStatus::Success)
        .count();
    report.success_rate = successful as f64 / records.len() as f64 * 100.0;

    let durations: Vec<i64> = records.iter().filter_map(|r| r.duration_secs).collect();
    if !durations.is_empty() {
        report.avg_duration_secs = durations.iter().sum::<i64>() as f64 / durations.len() as f64;
    }

    let failures: Vec<&DeploymentRecord> = records
        .iter()
        .filter(|r| r.status == DeploymentStatus::Failed)
        .collect();
    let mut counts: HashMap<ErrorCategory, usize> = HashMap::new();
    for record in &failures {
        let analysis = analyzer.analyze(&record.combined_log(), record.project_type);
        *counts.entry(analysis.category).or_default() += 1;
    }
    let mut trends: Vec<(ErrorCategory, usize)> = counts.into_iter().collect();
    trends.sort_by(|(cat_a, a), (cat_b, b)| b.cmp(a).then_with(|| cat_a.cmp(cat_b)));

    let concentrated = trends
        .first()
        .is_some_and(|(_, top)| *top as f64 / failures.len() as f64 > 0.5);

    let mut value = report.success_rate;
    if report.avg_duration_secs > SLOW_DEPLOY_SECS {
        value -= ((report.avg_duration_secs - SLOW_DEPLOY_SECS) / 60.0).min(MAX_DURATION_PENALTY);
    }
    if concentrated {
        value -= CONCENTRATION_PENALTY;
    }
    report.score = value.clamp(0.0, 100.0) as u32;

    report.failure_trends = trends
        .iter()
        .map(|(category, count)| FailureTrend {
            category: category.to_string(),
            count: *count,
            percentage: *count as f64 / failures.len() as f64 * 100.0,
        })
        .collect();
    report.recommendations = recommendations(&report, concentrated);
    report
}

fn recommendations(report: &HealthScoreResponse, concentrated: bool) -> Vec<String> {
    let mut out = Vec::new();

    if report.success_rate < 50.0 {
        out.push(
            "Success rate is below 50%; pause automatic deploys and fix the failing build"
                .to_string(),
        );
    } else if report.success_rate < 80.0 {
        out.push("Success rate is below 80%; review recent failures".to_string());
    }

    if let (true, Some(top)) = (concentrated, report.failure_trends.first()) {
        out.push(format!(
            "{:.0}% of failures are {}; address that cause first",
            top.percentage, top.category
        ));
    }

    if report.avg_duration_secs > SLOW_DEPLOY_SECS {
        out.push(format!(
            "Deployments average {:.0}s; cache dependencies or trim the build",
            report.avg_duration_secs
        ));
    }

    if out.is_empty() {
        out.push("Deployments are healthy".to_string());
    }
    out
}
