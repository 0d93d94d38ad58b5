//! Observability: runtime counters and the sink abstraction sessions report
//! through.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, EventState, ListCounters, ListSummary};
pub use sink::{
    GlobalMetricsSink, MetricsEvent, MetricsSink, OverlayKind, PageKind, metrics_report,
    metrics_reset_all,
};
