pub mod always;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ApprovalError;
use crate::models::csr::CertificateSigningRequest;
use crate::registry::Registry;
use crate::retry::Updater;

/// What an approver did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Approval {
    /// An approval was written; carries the stored object.
    Approved(CertificateSigningRequest),
    /// The approver's rule does not cover this request.
    Abstained,
    /// The request (or a fresh copy fetched after a conflict) already
    /// carried a condition, so nothing was written.
    AlreadyDecided,
}

/// Decides whether to approve a request that no inspector objected to.
#[async_trait]
pub trait Approver: Send + Sync {
    /// Approve `request` if this approver's rule covers it, persisting the
    /// condition through `updater`. Abstaining is not an error.
    async fn approve(
        &self,
        updater: &Updater<'_>,
        request: CertificateSigningRequest,
    ) -> Result<Approval, ApprovalError>;
}

/// Register every built-in approver.
pub fn register_builtins(registry: &Registry<dyn Approver>) {
    registry.register("always", Arc::new(always::Always));
}
