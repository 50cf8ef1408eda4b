//! Prometheus metrics for the action pipeline.
//!
//! The invoker records through [`PipelineMetrics`]; [`MetricsServer`] installs
//! the Prometheus recorder that collects them.
//!
//! # Example
//!
//! ```rust,no_run
//! use composable_mvc_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Render the scrape body from any handler
//! let _body = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder and renderer.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server that will advertise `addr` as its scrape address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe the pipeline metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed is not an error; [`MetricsServer::render`]
    /// then returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - scrape at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// The scrape address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "mvc_actions_invoked_total",
        "Total number of actions selected and invoked"
    );
    describe_counter!(
        "mvc_actions_not_found_total",
        "Total number of requests for which no action matched"
    );
    describe_counter!(
        "mvc_authorization_short_circuits_total",
        "Total number of actions replaced by an authorization filter result"
    );
    describe_counter!(
        "mvc_exceptions_handled_total",
        "Total number of failures handled by exception filters"
    );
    describe_counter!(
        "mvc_exceptions_unhandled_total",
        "Total number of failures no exception filter handled"
    );
    describe_histogram!(
        "mvc_action_duration_seconds",
        "Time taken to run an action and its result inside the filter pipeline"
    );
}

/// Pipeline metrics recorder.
pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record an invoked action and how long its pipeline took.
    pub fn record_invocation(duration: Duration) {
        counter!("mvc_actions_invoked_total").increment(1);
        histogram!("mvc_action_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a request no action matched.
    pub fn record_not_found() {
        counter!("mvc_actions_not_found_total").increment(1);
    }

    /// Record an authorization short-circuit.
    pub fn record_short_circuit() {
        counter!("mvc_authorization_short_circuits_total").increment(1);
    }

    /// Record a failure handled by an exception filter.
    pub fn record_handled_exception() {
        counter!("mvc_exceptions_handled_total").increment(1);
    }

    /// Record a failure that escaped the pipeline.
    pub fn record_unhandled_exception() {
        counter!("mvc_exceptions_unhandled_total").increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[tokio::test]
    async fn test_pipeline_metrics_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        PipelineMetrics::record_invocation(Duration::from_millis(3));
        PipelineMetrics::record_not_found();
        PipelineMetrics::record_short_circuit();

        // Another test may have installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("mvc_actions_invoked_total"));
            assert!(rendered.contains("mvc_actions_not_found_total"));
            assert!(rendered.contains("mvc_authorization_short_circuits_total"));
        }
    }
}
