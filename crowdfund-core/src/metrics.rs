//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the engine.
//!
//! # Metrics
//!
//! - `crowdfund_campaigns_created_total` - Campaigns created
//! - `crowdfund_contributions_total` - Contributions accepted
//! - `crowdfund_claims_total` - Successful claims
//! - `crowdfund_refunds_total` - Refunds paid
//! - `crowdfund_rejected_total{code}` - Rejected operations by error code
//! - `crowdfund_operation_duration_seconds{operation}` - Operation latency

use crate::error::ErrorCode;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Every collector owns its own [`Registry`], so several engines (tests,
/// multi-tenant hosts) can live in one process.
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Campaigns created
    pub campaigns_created: IntCounter,

    /// Contributions accepted
    pub contributions: IntCounter,

    /// Claims paid
    pub claims: IntCounter,

    /// Refunds paid
    pub refunds: IntCounter,

    /// Rejected operations by code
    pub rejected: IntCounterVec,

    /// Operation latency
    pub operation_duration: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let campaigns_created = IntCounter::new(
            "crowdfund_campaigns_created_total",
            "Total number of campaigns created",
        )?;
        registry.register(Box::new(campaigns_created.clone()))?;

        let contributions = IntCounter::new(
            "crowdfund_contributions_total",
            "Total number of contributions accepted",
        )?;
        registry.register(Box::new(contributions.clone()))?;

        let claims = IntCounter::new("crowdfund_claims_total", "Total number of claims paid")?;
        registry.register(Box::new(claims.clone()))?;

        let refunds = IntCounter::new("crowdfund_refunds_total", "Total number of refunds paid")?;
        registry.register(Box::new(refunds.clone()))?;

        let rejected = IntCounterVec::new(
            Opts::new("crowdfund_rejected_total", "Rejected operations by error code"),
            &["code"],
        )?;
        registry.register(Box::new(rejected.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "crowdfund_operation_duration_seconds",
                "Histogram of engine operation latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            campaigns_created,
            contributions,
            claims,
            refunds,
            rejected,
            operation_duration,
            registry,
        })
    }

    /// Record a rejected operation
    pub fn record_rejection(&self, code: ErrorCode) {
        self.rejected
            .with_label_values(&[&code.as_u32().to_string()])
            .inc();
    }

    /// Record operation latency
    pub fn record_duration(&self, operation: &str, seconds: f64) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(seconds);
    }

    /// Rejections recorded for `code`
    pub fn rejections(&self, code: ErrorCode) -> u64 {
        self.rejected
            .with_label_values(&[&code.as_u32().to_string()])
            .get()
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
