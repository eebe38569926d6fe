//! Alert types emitted by the risk dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::risk::{DataQuality, RiskLevel, RiskType, TrendDirection, VppId};

/// Routing priority for downstream notification consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Medium,
    High,
}

/// Configured trigger for one risk category: alert once the assessed level
/// reaches `severity` against the given threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub risk_type: RiskType,
    pub threshold: f64,
    pub severity: RiskLevel,
}

/// An immutable alert event. Append-only: once emitted it is never edited,
/// only acknowledged by the downstream notification subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub vpp_id: VppId,
    pub risk_type: RiskType,
    pub level: RiskLevel,
    pub score: f64,
    pub threshold: f64,
    pub trend: TrendDirection,
    pub message: String,
    pub priority: AlertPriority,
    pub data_quality: DataQuality,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vpp_id: VppId,
        risk_type: RiskType,
        level: RiskLevel,
        score: f64,
        threshold: f64,
        trend: TrendDirection,
        message: String,
        data_quality: DataQuality,
    ) -> Self {
        let priority = if level == RiskLevel::Critical {
            AlertPriority::High
        } else {
            AlertPriority::Medium
        };
        Self {
            id: Uuid::new_v4(),
            vpp_id,
            risk_type,
            level,
            score,
            threshold,
            trend,
            message,
            priority,
            data_quality,
            timestamp: Utc::now(),
        }
    }
}
