use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::Inspector;
use crate::models::csr::{CertificateSigningRequest, KeyUsage};
use crate::store::CsrStore;

/// Denies requests asking for a key usage outside an allow-list.
/// Config: `|`-separated usages, e.g. `digital signature|key encipherment`.
#[derive(Debug, Clone)]
pub struct UsagesInspector {
    allowed: HashSet<KeyUsage>,
}

impl Default for UsagesInspector {
    fn default() -> Self {
        Self {
            allowed: [
                KeyUsage::DigitalSignature,
                KeyUsage::KeyEncipherment,
                KeyUsage::ClientAuth,
            ]
            .into_iter()
            .collect(),
        }
    }
}

#[async_trait]
impl Inspector for UsagesInspector {
    fn configure(&self, config: &str) -> anyhow::Result<Arc<dyn Inspector>> {
        let allowed: HashSet<KeyUsage> = config
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(KeyUsage::from)
            .collect();
        if allowed.is_empty() {
            anyhow::bail!("usage allow-list must name at least one usage");
        }
        Ok(Arc::new(UsagesInspector { allowed }))
    }

    async fn inspect(
        &self,
        _store: &dyn CsrStore,
        request: &CertificateSigningRequest,
    ) -> anyhow::Result<Option<String>> {
        let denied = request
            .spec
            .usages
            .iter()
            .find(|usage| !self.allowed.contains(*usage));

        Ok(denied.map(|usage| format!("key usage {:?} is not allowed", usage.as_str())))
    }
}
