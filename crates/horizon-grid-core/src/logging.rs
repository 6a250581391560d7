//! Logging and tracing facilities for Horizon Grid.
//!
//! Horizon Grid is instrumented with the `tracing` crate and never installs a
//! subscriber itself. To see logs, install one in the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_grid::edit=debug,horizon_grid::fetch=info")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_grid_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_grid_core::signal";
    /// Async runtime target.
    pub const RUNTIME: &str = "horizon_grid_core::runtime";
    /// Query construction target.
    pub const QUERY: &str = "horizon_grid::query";
    /// Interaction state machine target.
    pub const STATE: &str = "horizon_grid::state";
    /// Optimistic edit protocol target.
    pub const EDIT: &str = "horizon_grid::edit";
    /// Row fetch target.
    pub const FETCH: &str = "horizon_grid::fetch";
    /// Data service target.
    pub const SERVICE: &str = "horizon_grid::service";
}

/// Span names used for performance tracing.
pub mod span_names {
    /// A page fetch round trip.
    pub const FETCH_PAGE: &str = "fetch_page";
    /// An edit transaction round trip.
    pub const RUN_TRANSACTION: &str = "run_transaction";
    /// Building a render snapshot.
    pub const BUILD_FRAME: &str = "build_frame";
}

/// A guard that records how long an operation took.
///
/// The span stays entered until the guard is dropped.
///
/// # Example
///
/// ```
/// use horizon_grid_core::PerfSpan;
///
/// {
///     let _span = PerfSpan::new("build_query");
///     // timed work
/// }
/// ```
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_grid::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_without_subscriber() {
        let _span = PerfSpan::new("test_operation");
        tracing::info!(target: targets::CORE, "inside span");
    }
}
