//! Health reporting types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::job::JobStats;

/// Health of a single dependency or of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }

    /// Overall state from dependency states.
    ///
    /// Any unhealthy dependency makes the system unhealthy. A single degraded
    /// dependency is tolerated; more than one degrades the system.
    pub fn aggregate<I>(states: I) -> Self
    where
        I: IntoIterator<Item = HealthState>,
    {
        let mut degraded = 0usize;
        for state in states {
            match state {
                HealthState::Unhealthy => return HealthState::Unhealthy,
                HealthState::Degraded => degraded += 1,
                HealthState::Healthy => {}
            }
        }
        if degraded > 1 {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How many of a provider's backends are currently usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderAvailability {
    pub available: usize,
    pub total: usize,
}

impl ProviderAvailability {
    pub fn new(available: usize, total: usize) -> Self {
        Self {
            available: available.min(total),
            total,
        }
    }

    pub fn state(&self) -> HealthState {
        if self.total == 0 || self.available == 0 {
            HealthState::Unhealthy
        } else if self.available < self.total {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }
}

/// Health of one dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyHealth {
    pub state: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<ProviderAvailability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl DependencyHealth {
    pub fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            message: None,
            availability: None,
            latency_ms: None,
        }
    }

    pub fn degraded(msg: impl Into<String>) -> Self {
        Self {
            state: HealthState::Degraded,
            message: Some(msg.into()),
            availability: None,
            latency_ms: None,
        }
    }

    pub fn unhealthy(msg: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unhealthy,
            message: Some(msg.into()),
            availability: None,
            latency_ms: None,
        }
    }

    /// Health derived from provider availability.
    pub fn from_availability(availability: ProviderAvailability) -> Self {
        let state = availability.state();
        let message = match state {
            HealthState::Healthy => None,
            _ => Some(format!(
                "{}/{} providers available",
                availability.available, availability.total
            )),
        };
        Self {
            state,
            message,
            availability: Some(availability),
            latency_ms: None,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Aggregated system health.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthReport {
    pub status: HealthState,
    pub dependencies: BTreeMap<String, DependencyHealth>,
    pub jobs: JobStats,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn new(dependencies: BTreeMap<String, DependencyHealth>, jobs: JobStats) -> Self {
        let status = HealthState::aggregate(dependencies.values().map(|d| d.state));
        Self {
            status,
            dependencies,
            jobs,
            checked_at: Utc::now(),
        }
    }

    pub fn dependency(&self, name: &str) -> Option<&DependencyHealth> {
        self.dependencies.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate() {
        use HealthState::*;
        assert_eq!(HealthState::aggregate([Healthy, Healthy]), Healthy);
        assert_eq!(HealthState::aggregate([Healthy, Degraded]), Healthy);
        assert_eq!(HealthState::aggregate([Degraded, Degraded]), Degraded);
        assert_eq!(HealthState::aggregate([Degraded, Unhealthy]), Unhealthy);
        assert_eq!(HealthState::aggregate(std::iter::empty()), Healthy);
    }

    #[test]
    fn test_provider_availability() {
        assert_eq!(ProviderAvailability::new(3, 3).state(), HealthState::Healthy);
        assert_eq!(ProviderAvailability::new(1, 3).state(), HealthState::Degraded);
        assert_eq!(ProviderAvailability::new(0, 3).state(), HealthState::Unhealthy);
        assert_eq!(ProviderAvailability::new(5, 2).available, 2);

        let health = DependencyHealth::from_availability(ProviderAvailability::new(1, 2));
        assert_eq!(health.state, HealthState::Degraded);
        assert_eq!(health.message.as_deref(), Some("1/2 providers available"));
    }

    #[test]
    fn test_report_status() {
        let mut deps = BTreeMap::new();
        deps.insert("cdn".to_string(), DependencyHealth::unhealthy("bucket unreachable"));
        deps.insert("downloader".to_string(), DependencyHealth::healthy());
        let report = HealthReport::new(deps, JobStats::default());
        assert_eq!(report.status, HealthState::Unhealthy);
        assert!(report.dependency("cdn").is_some());
    }
}
