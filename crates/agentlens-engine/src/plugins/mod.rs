//! The representative analytics plugins (§4.6) and a helper that wires them
//! into a registry with their real dependency edges.

pub mod annotation_analytics;
pub mod causal_discovery;
pub mod change_point_detector;
pub mod cycle_detector;
pub mod issue_analytics;
pub mod issue_distribution_trace;
pub mod task_analytics;

pub use annotation_analytics::AnnotationAnalytics;
pub use causal_discovery::CausalDiscovery;
pub use change_point_detector::ChangePointDetector;
pub use cycle_detector::CycleDetector;
pub use issue_analytics::IssueAnalytics;
pub use issue_distribution_trace::IssueDistributionTrace;
pub use task_analytics::TaskAnalytics;

use std::sync::Arc;

use crate::analytics::AnalyticsRegistry;
use crate::error::AnalyticsResult;

/// Registers the full representative plugin set with its real
/// `depends_on` edges: everything downstream of task extraction waits on
/// `task_analytics`, and the trace-level issue rollup additionally waits on
/// `issue_analytics`.
pub fn register_default_plugins(registry: &AnalyticsRegistry) -> AnalyticsResult<()> {
    registry.register(Arc::new(TaskAnalytics))?;
    registry.register(Arc::new(IssueAnalytics))?;
    registry.register(Arc::new(AnnotationAnalytics))?;
    registry.register(Arc::new(CycleDetector))?;
    registry.register(Arc::new(ChangePointDetector))?;
    registry.register(Arc::new(CausalDiscovery))?;
    registry.register(Arc::new(IssueDistributionTrace))?;
    Ok(())
}
