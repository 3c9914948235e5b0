pub mod memory;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::csr::CertificateSigningRequest;

/// Persistence boundary for certificate signing requests.
/// Implementations: MemoryStore (in-process, versioned); a cluster API client
/// lives outside this crate.
///
/// Every returned object carries the store's current `resourceVersion`;
/// `update_approval` must reject a write whose version is stale with
/// [`StoreError::Conflict`].
#[async_trait]
pub trait CsrStore: Send + Sync {
    /// Fetch the current version of a request by name.
    async fn get(&self, name: &str) -> Result<CertificateSigningRequest, StoreError>;

    /// Persist the request's approval status (its condition list).
    /// Returns the stored object with its new version.
    async fn update_approval(
        &self,
        request: &CertificateSigningRequest,
    ) -> Result<CertificateSigningRequest, StoreError>;

    /// All requests currently known to the store.
    async fn list(&self) -> Result<Vec<CertificateSigningRequest>, StoreError>;
}
