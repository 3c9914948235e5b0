//! Prometheus metrics for approval decisions.
//!
//! Metrics live in a registry owned by the recorder rather than the global
//! default one, so several deciders (and tests) can coexist in one process.
//! `render()` produces the text exposition format.

use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

pub struct DecisionMetrics {
    registry: Registry,
    decisions_total: IntCounterVec,
    update_conflicts_total: IntCounter,
}

impl DecisionMetrics {
    /// Create and register all metrics in a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions_total = IntCounterVec::new(
            opts!(
                "csr_approver_decisions_total",
                "Certificate signing requests processed, by verdict"
            ),
            &["verdict"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let update_conflicts_total = IntCounter::with_opts(opts!(
            "csr_approver_update_conflicts_total",
            "Approval updates rejected because the stored object had changed"
        ))?;
        registry.register(Box::new(update_conflicts_total.clone()))?;

        Ok(Self {
            registry,
            decisions_total,
            update_conflicts_total,
        })
    }

    /// Count one processed request. `verdict` is a short label such as
    /// "approved", "denied", "no_action" or an error kind.
    pub fn record_decision(&self, verdict: &str) {
        self.decisions_total.with_label_values(&[verdict]).inc();
    }

    pub fn record_conflict(&self) {
        self.update_conflicts_total.inc();
    }

    pub fn decisions(&self, verdict: &str) -> u64 {
        self.decisions_total.with_label_values(&[verdict]).get()
    }

    pub fn conflicts(&self) -> u64 {
        self.update_conflicts_total.get()
    }

    /// Text exposition of every metric in this recorder's registry.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
