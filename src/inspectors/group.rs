use std::sync::Arc;

use async_trait::async_trait;

use super::Inspector;
use crate::models::csr::CertificateSigningRequest;
use crate::store::CsrStore;

const DEFAULT_GROUP: &str = "system:nodes";

/// Denies requests whose submitter is not a member of a required group.
/// Config: the group name (exact match).
#[derive(Debug, Clone)]
pub struct GroupInspector {
    group: String,
}

impl Default for GroupInspector {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
        }
    }
}

#[async_trait]
impl Inspector for GroupInspector {
    fn configure(&self, config: &str) -> anyhow::Result<Arc<dyn Inspector>> {
        let group = config.trim();
        if group.is_empty() {
            anyhow::bail!("group name must not be blank");
        }
        Ok(Arc::new(GroupInspector {
            group: group.to_string(),
        }))
    }

    async fn inspect(
        &self,
        _store: &dyn CsrStore,
        request: &CertificateSigningRequest,
    ) -> anyhow::Result<Option<String>> {
        if request.in_group(&self.group) {
            return Ok(None);
        }
        Ok(Some(format!(
            "user {:?} is not a member of group {:?}",
            request.spec.username, self.group
        )))
    }
}
