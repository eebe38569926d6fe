//! Alert dispatch — compares assessments against configured rules and trend
//! direction, persists alert records and fans them out on a channel.
//!
//! Dispatch is retry-safe by construction: re-dispatching the same
//! assessments produces new alert records with identical content (the system
//! intentionally does not deduplicate; downstream consumers aggregate).

use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use gp_data::AlertSink;
use gp_types::{
    Alert, AlertRule, RiskAssessment, RiskLevel, RiskThresholds, RiskType, TrendDirection, VppId,
};

/// Emits alerts for assessments at or above each rule's severity.
pub struct AlertDispatcher {
    rules: HashMap<RiskType, AlertRule>,
    sink: Arc<dyn AlertSink>,
    alert_tx: Sender<Alert>,
}

impl AlertDispatcher {
    pub fn new(
        rules: HashMap<RiskType, AlertRule>,
        sink: Arc<dyn AlertSink>,
        alert_tx: Sender<Alert>,
    ) -> Self {
        Self {
            rules,
            sink,
            alert_tx,
        }
    }

    /// Default rule set: one rule per risk type at the configured threshold,
    /// triggering from High upward.
    pub fn default_rules(thresholds: &RiskThresholds) -> HashMap<RiskType, AlertRule> {
        RiskType::ALL
            .iter()
            .map(|&risk_type| {
                (
                    risk_type,
                    AlertRule {
                        risk_type,
                        threshold: thresholds.get(risk_type),
                        severity: RiskLevel::High,
                    },
                )
            })
            .collect()
    }

    /// Evaluate every assessment, emit one alert per triggered rule.
    ///
    /// Each alert is appended to the persistence sink and sent on the alert
    /// channel (best-effort, like the rest of the pipeline: a dropped
    /// receiver only loses fan-out, not persistence).
    pub async fn dispatch(
        &self,
        vpp_id: &VppId,
        assessments: &HashMap<RiskType, RiskAssessment>,
        trends: &HashMap<RiskType, TrendDirection>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        // Fixed category order keeps emission deterministic.
        for risk_type in RiskType::ALL {
            let Some(assessment) = assessments.get(&risk_type) else {
                continue;
            };
            let trigger = self
                .rules
                .get(&risk_type)
                .map(|rule| rule.severity)
                .unwrap_or(RiskLevel::High);
            if assessment.level < trigger {
                continue;
            }

            let trend = trends
                .get(&risk_type)
                .copied()
                .unwrap_or(TrendDirection::Stable);
            let message = format!(
                "{} risk level is {} ({:.3})",
                risk_type, assessment.level, assessment.score
            );
            let alert = Alert::new(
                vpp_id.clone(),
                risk_type,
                assessment.level,
                assessment.score,
                assessment.threshold,
                trend,
                message,
                assessment.metric.data_quality,
            );

            if let Err(e) = self.sink.save_alert(&alert).await {
                warn!(vpp = %vpp_id, risk = %risk_type, error = %e, "failed to persist alert");
            }
            let _ = self.alert_tx.try_send(alert.clone());

            info!(
                vpp = %vpp_id,
                risk = %risk_type,
                level = %assessment.level,
                score = assessment.score,
                trend = %trend,
                "risk alert emitted"
            );
            alerts.push(alert);
        }

        alerts
    }
}
