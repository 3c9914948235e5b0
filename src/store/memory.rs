//! MemoryStore: in-process [`CsrStore`] with optimistic concurrency.
//!
//! Every write stamps the object with a fresh `resourceVersion` taken from a
//! store-wide revision counter. An approval update whose version differs from
//! the stored one is rejected with `StoreError::Conflict`, the same way the
//! cluster API behaves. Versions loaded from a dump are kept as-is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::CsrStore;
use crate::errors::StoreError;
use crate::models::csr::CertificateSigningRequest;

#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<DashMap<String, CertificateSigningRequest>>,
    revision: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a batch of requests.
    pub fn from_requests(requests: impl IntoIterator<Item = CertificateSigningRequest>) -> Self {
        let store = Self::new();
        for request in requests {
            store.insert(request);
        }
        store
    }

    fn next_version(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Create or replace an object, returning the stored version.
    ///
    /// A new object keeps the `resourceVersion` it was loaded with; a
    /// replacement, or an object without one, gets a fresh version.
    pub fn insert(&self, mut request: CertificateSigningRequest) -> CertificateSigningRequest {
        let keep = !request.metadata.resource_version.is_empty()
            && !self.objects.contains_key(request.name());

        if keep {
            // Numeric versions from a dump push the counter past them so a
            // later write never reuses one.
            if let Ok(loaded) = request.metadata.resource_version.parse::<u64>() {
                self.revision.fetch_max(loaded, Ordering::SeqCst);
            }
        } else {
            request.metadata.resource_version = self.next_version();
        }

        self.objects
            .insert(request.metadata.name.clone(), request.clone());
        request
    }

    /// Apply an out-of-band change to a stored object, as another actor
    /// would. Bumps the version so in-flight writers see a conflict.
    pub fn modify<F>(&self, name: &str, f: F) -> Option<CertificateSigningRequest>
    where
        F: FnOnce(&mut CertificateSigningRequest),
    {
        let mut entry = self.objects.get_mut(name)?;
        f(entry.value_mut());
        entry.metadata.resource_version = self.next_version();
        Some(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl CsrStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<CertificateSigningRequest, StoreError> {
        self.objects
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    async fn update_approval(
        &self,
        request: &CertificateSigningRequest,
    ) -> Result<CertificateSigningRequest, StoreError> {
        let mut entry = self
            .objects
            .get_mut(request.name())
            .ok_or_else(|| StoreError::NotFound {
                name: request.name().to_string(),
            })?;

        if entry.metadata.resource_version != request.metadata.resource_version {
            return Err(StoreError::Conflict {
                name: request.name().to_string(),
            });
        }

        // Only the approval status is writable through this call.
        entry.status.conditions = request.status.conditions.clone();
        entry.metadata.resource_version = self.next_version();
        Ok(entry.value().clone())
    }

    async fn list(&self) -> Result<Vec<CertificateSigningRequest>, StoreError> {
        let mut all: Vec<CertificateSigningRequest> =
            self.objects.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(all)
    }
}
