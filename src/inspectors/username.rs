use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;

use super::Inspector;
use crate::models::csr::CertificateSigningRequest;
use crate::store::CsrStore;

const DEFAULT_PATTERN: &str = "^system:node:";

/// Denies requests whose submitter username does not match a pattern.
/// Config: a regular expression. It may itself contain `=`.
#[derive(Debug, Clone)]
pub struct UsernameInspector {
    pattern: Regex,
}

impl Default for UsernameInspector {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_PATTERN).expect("default username pattern is valid"),
        }
    }
}

#[async_trait]
impl Inspector for UsernameInspector {
    fn configure(&self, config: &str) -> anyhow::Result<Arc<dyn Inspector>> {
        let pattern = Regex::new(config)
            .with_context(|| format!("invalid username pattern {:?}", config))?;
        Ok(Arc::new(UsernameInspector { pattern }))
    }

    async fn inspect(
        &self,
        _store: &dyn CsrStore,
        request: &CertificateSigningRequest,
    ) -> anyhow::Result<Option<String>> {
        if self.pattern.is_match(&request.spec.username) {
            return Ok(None);
        }
        Ok(Some(format!(
            "username {:?} does not match {:?}",
            request.spec.username,
            self.pattern.as_str()
        )))
    }
}
