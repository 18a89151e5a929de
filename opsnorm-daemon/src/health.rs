//! Aggregated health reporting.
//!
//! The daemon has two components: the log pipeline and the record sink.
//! The overall status is the worst component status.
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reasons)
//! - Any Unhealthy -> Unhealthy(reasons)

use serde::Serialize;

use opsnorm_core::pipeline::HealthStatus;

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall status (worst of all components).
    pub status: HealthStatus,
    /// Seconds since the orchestrator was built.
    pub uptime_secs: u64,
    /// Number of configured receivers.
    pub receivers: usize,
    /// Per-component reports.
    pub components: Vec<ComponentHealth>,
}

/// Health of a single daemon component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (`log-pipeline`, `record-sink`).
    pub name: String,
    /// Current status.
    pub status: HealthStatus,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Reduce component statuses to the worst one, joining the reasons.
///
/// Once a component is Unhealthy, Degraded reasons are no longer collected.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let unhealthy: Vec<String> = components
        .iter()
        .filter_map(|c| match &c.status {
            HealthStatus::Unhealthy(reason) => Some(format!("{}: {}", c.name, reason)),
            _ => None,
        })
        .collect();
    if !unhealthy.is_empty() {
        return HealthStatus::Unhealthy(unhealthy.join("; "));
    }

    let degraded: Vec<String> = components
        .iter()
        .filter_map(|c| match &c.status {
            HealthStatus::Degraded(reason) => Some(format!("{}: {}", c.name, reason)),
            _ => None,
        })
        .collect();
    if !degraded.is_empty() {
        return HealthStatus::Degraded(degraded.join("; "));
    }

    HealthStatus::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_healthy() {
        assert_eq!(aggregate_status(&[]), HealthStatus::Healthy);
    }

    #[test]
    fn unhealthy_hides_degraded_reasons() {
        let components = [
            ComponentHealth::new("log-pipeline", HealthStatus::Degraded("sources stopped: gc".into())),
            ComponentHealth::new("record-sink", HealthStatus::Unhealthy("writer stopped".into())),
        ];
        assert_eq!(
            aggregate_status(&components),
            HealthStatus::Unhealthy("record-sink: writer stopped".into())
        );
    }

    #[test]
    fn degraded_reasons_are_joined() {
        let components = [
            ComponentHealth::new("a", HealthStatus::Degraded("x".into())),
            ComponentHealth::new("b", HealthStatus::Healthy),
            ComponentHealth::new("c", HealthStatus::Degraded("y".into())),
        ];
        assert_eq!(
            aggregate_status(&components),
            HealthStatus::Degraded("a: x; c: y".into())
        );
    }
}
