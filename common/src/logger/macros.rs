use tracing::{Span, field};

use super::TraceId;

/// Root span for one unit of work (a trade submission, a CLI command).
///
/// `ticker` and `broker_id` start empty and are filled in once known.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = trace_id.as_str(),
        ticker = field::Empty,
        broker_id = field::Empty
    )
}

/// Child span; inherits `trace_id` from whatever root span is current.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name)
}
