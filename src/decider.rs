//! Decision evaluator: one verdict per certificate signing request.
//!
//! For each request:
//! 1. Requests that already carry a condition are left alone
//! 2. Inspectors run in policy order; the first objection denies the request,
//!    the first error defers it (no condition is written)
//! 3. With no objection, the configured approver may approve it
//!
//! At most one condition is persisted per call, always through the
//! update-with-retry protocol in [`crate::retry`].

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::approvers::{Approval, Approver};
use crate::errors::{ApprovalError, PolicyError};
use crate::inspectors::{Inspectors, Objection};
use crate::metrics::DecisionMetrics;
use crate::models::csr::{CertificateSigningRequest, CsrCondition};
use crate::registry::Plugins;
use crate::retry::{RetryPolicy, Updater};
use crate::store::CsrStore;

/// Reason recorded on conditions written for an inspector objection.
pub const DENIED_REASON: &str = "InspectorDenied";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Decision {
    /// The request already carried a condition, or gained one from another
    /// actor while this decision was being written.
    AlreadyDecided,
    Approved,
    Denied(Objection),
    /// No objection, and the approver abstained.
    NoAction,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::AlreadyDecided => "already_decided",
            Decision::Approved => "approved",
            Decision::Denied(_) => "denied",
            Decision::NoAction => "no_action",
        }
    }
}

pub struct Decider {
    approver: Option<(String, Arc<dyn Approver>)>,
    inspectors: Inspectors,
    policy: RetryPolicy,
    metrics: Option<Arc<DecisionMetrics>>,
}

impl Decider {
    pub fn new(
        approver: Option<(String, Arc<dyn Approver>)>,
        inspectors: Inspectors,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            approver,
            inspectors,
            policy,
            metrics: None,
        }
    }

    /// Resolve an approver name and an inspector policy against `plugins`.
    /// A blank approver name runs the inspectors only.
    pub fn from_policy(
        plugins: &Plugins,
        approver: &str,
        inspectors: &str,
        policy: RetryPolicy,
    ) -> Result<Self, PolicyError> {
        let approver = approver.trim();
        let approver = if approver.is_empty() {
            None
        } else {
            let found = plugins
                .approvers
                .get(&approver.to_lowercase())
                .ok_or_else(|| PolicyError::UnknownPlugin {
                    kind: plugins.approvers.kind(),
                    name: approver.to_string(),
                    registered: plugins.approvers.list(),
                })?;
            Some((approver.to_lowercase(), found))
        };

        let inspectors = Inspectors::parse(&plugins.inspectors, inspectors)?;
        Ok(Self::new(approver, inspectors, policy))
    }

    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn inspectors(&self) -> &Inspectors {
        &self.inspectors
    }

    pub fn approver_name(&self) -> Option<&str> {
        self.approver.as_ref().map(|(name, _)| name.as_str())
    }

    /// Decide on one request and persist the outcome.
    ///
    /// An `Err` never leaves a condition behind; the request stays pending.
    pub async fn decide(
        &self,
        store: &dyn CsrStore,
        request: CertificateSigningRequest,
        cancel: &CancellationToken,
    ) -> Result<Decision, ApprovalError> {
        let name = request.metadata.name.clone();
        let result = self.evaluate(store, request, cancel).await;

        match &result {
            Ok(decision) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_decision(decision.label());
                }
            }
            Err(e) => {
                warn!(csr = %name, kind = e.kind(), error = %e, "no decision reached");
                if let Some(metrics) = &self.metrics {
                    metrics.record_decision(e.kind());
                }
            }
        }
        result
    }

    async fn evaluate(
        &self,
        store: &dyn CsrStore,
        request: CertificateSigningRequest,
        cancel: &CancellationToken,
    ) -> Result<Decision, ApprovalError> {
        if request.is_decided() {
            return Ok(Decision::AlreadyDecided);
        }

        let mut updater = Updater::new(store, &self.policy, cancel);
        if let Some(metrics) = &self.metrics {
            updater = updater.with_metrics(metrics);
        }

        if let Some(objection) = self.inspectors.run(store, &request).await? {
            return self.deny(&updater, request, objection).await;
        }

        let Some((approver_name, approver)) = &self.approver else {
            return Ok(Decision::NoAction);
        };

        match approver.approve(&updater, request).await? {
            Approval::Approved(_) => Ok(Decision::Approved),
            Approval::AlreadyDecided => Ok(Decision::AlreadyDecided),
            Approval::Abstained => {
                tracing::debug!(approver = %approver_name, "approver abstained");
                Ok(Decision::NoAction)
            }
        }
    }

    async fn deny(
        &self,
        updater: &Updater<'_>,
        request: CertificateSigningRequest,
        objection: Objection,
    ) -> Result<Decision, ApprovalError> {
        let name = request.metadata.name.clone();
        let condition = CsrCondition::denied(DENIED_REASON, objection.message.clone());

        let written = updater
            .update_with_retry(request, |req| {
                if req.is_decided() {
                    return false;
                }
                req.status.conditions.push(condition.clone());
                true
            })
            .await?;

        if written.is_none() {
            return Ok(Decision::AlreadyDecided);
        }

        info!(
            csr = %name,
            inspector = %objection.inspector,
            message = %objection.message,
            "denied certificate signing request"
        );
        Ok(Decision::Denied(objection))
    }
}
