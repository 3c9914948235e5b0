//! Automatic approval of kubelet TLS bootstrap requests.
//!
//! Approves any request submitted by the bootstrap identity without further
//! validation, as long as nobody has approved or denied it yet. Never denies.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Approval, Approver};
use crate::errors::ApprovalError;
use crate::models::csr::{CertificateSigningRequest, CsrCondition};
use crate::retry::Updater;

pub const BOOTSTRAP_USERNAME: &str = "kubelet-bootstrap";
pub const BOOTSTRAP_GROUP: &str = "system:kubelet-bootstrap";

const REASON: &str = "AutoApproved";
const MESSAGE: &str = "Auto approving of all kubelet CSRs is enabled on bootkube";

#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

/// Undecided, and submitted by the bootstrap user from the bootstrap group.
/// Both checks are exact and case-sensitive.
pub fn is_pending_bootstrap(request: &CertificateSigningRequest) -> bool {
    // Any condition, including a signer's `Failed`, is a final decision.
    if request.is_decided() {
        return false;
    }
    request.spec.username == BOOTSTRAP_USERNAME && request.in_group(BOOTSTRAP_GROUP)
}

#[async_trait]
impl Approver for Always {
    async fn approve(
        &self,
        updater: &Updater<'_>,
        request: CertificateSigningRequest,
    ) -> Result<Approval, ApprovalError> {
        let name = request.metadata.name.clone();
        let condition = CsrCondition::approved(REASON, MESSAGE);
        let mut decided = false;

        // Checked again on every re-fetch: a concurrent actor may have
        // decided the request between attempts.
        let approved = updater
            .update_with_retry(request, |req| {
                decided = req.is_decided();
                if !is_pending_bootstrap(req) {
                    return false;
                }
                req.status.conditions.push(condition.clone());
                true
            })
            .await?;

        match approved {
            Some(stored) => {
                info!(csr = %name, reason = REASON, "approved certificate signing request");
                Ok(Approval::Approved(stored))
            }
            None if decided => {
                debug!(csr = %name, "already approved or denied; skipping");
                Ok(Approval::AlreadyDecided)
            }
            None => {
                debug!(csr = %name, "not a pending bootstrap request; skipping");
                Ok(Approval::Abstained)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::csr::ConditionType;
    use crate::retry::RetryPolicy;
    use crate::store::memory::MemoryStore;
    use crate::store::CsrStore;
    use tokio_util::sync::CancellationToken;

    fn bootstrap(name: &str) -> CertificateSigningRequest {
        CertificateSigningRequest::new(
            name,
            BOOTSTRAP_USERNAME,
            vec!["system:authenticated".into(), BOOTSTRAP_GROUP.into()],
        )
    }

    #[tokio::test]
    async fn test_approves_bootstrap_request() {
        let store = MemoryStore::new();
        let req = store.insert(bootstrap("csr-1"));
        let policy = RetryPolicy::immediate(3);
        let cancel = CancellationToken::new();
        let updater = Updater::new(&store, &policy, &cancel);

        let Approval::Approved(updated) = Always.approve(&updater, req).await.unwrap() else {
            panic!("bootstrap request should be approved");
        };
        let cond = &updated.status.conditions[0];
        assert_eq!(cond.type_, ConditionType::Approved);
        assert_eq!(cond.reason, "AutoApproved");
        assert_eq!(store.get("csr-1").await.unwrap().status.conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let store = MemoryStore::new();
        let req = store.insert(bootstrap("csr-1"));
        let policy = RetryPolicy::immediate(3);
        let cancel = CancellationToken::new();
        let updater = Updater::new(&store, &policy, &cancel);

        let Approval::Approved(first) = Always.approve(&updater, req).await.unwrap() else {
            panic!("bootstrap request should be approved");
        };
        let before = store.get("csr-1").await.unwrap();

        assert_eq!(Always.approve(&updater, first).await.unwrap(), Approval::AlreadyDecided);
        assert_eq!(store.get("csr-1").await.unwrap(), before);
    }

    #[test]
    fn test_identity_must_match_exactly() {
        assert!(is_pending_bootstrap(&bootstrap("ok")));

        let near_misses = [
            CertificateSigningRequest::new("a", "Kubelet-bootstrap", vec![BOOTSTRAP_GROUP.into()]),
            CertificateSigningRequest::new("b", "kubelet-bootstrap ", vec![BOOTSTRAP_GROUP.into()]),
            CertificateSigningRequest::new("c", BOOTSTRAP_USERNAME, vec!["system:kubelet-bootstrapx".into()]),
            CertificateSigningRequest::new("d", BOOTSTRAP_USERNAME, vec!["System:kubelet-bootstrap".into()]),
            CertificateSigningRequest::new("e", BOOTSTRAP_USERNAME, vec![]),
        ];
        for req in &near_misses {
            assert!(!is_pending_bootstrap(req), "{} should not match", req.name());
        }
    }

    #[tokio::test]
    async fn test_abstains_silently() {
        let store = MemoryStore::new();
        let req = store.insert(CertificateSigningRequest::new(
            "csr-2",
            "system:node:n1",
            vec![BOOTSTRAP_GROUP.into()],
        ));
        let policy = RetryPolicy::immediate(3);
        let cancel = CancellationToken::new();
        let updater = Updater::new(&store, &policy, &cancel);

        assert_eq!(Always.approve(&updater, req).await.unwrap(), Approval::Abstained);
        assert!(!store.get("csr-2").await.unwrap().is_decided());
    }
}
