//! Batch runner: decide on every pending request held by a store.
//!
//! Stands in for a watch loop when requests come from a file dump.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::decider::{Decider, Decision};
use crate::models::csr::CertificateSigningRequest;
use crate::store::CsrStore;

/// Per-request result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shapes a request dump may take: a `kind: List` object as printed by
/// `kubectl get csr -o json`, a bare array, or a single object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Dump {
    List { items: Vec<CertificateSigningRequest> },
    Bare(Vec<CertificateSigningRequest>),
    Single(Box<CertificateSigningRequest>),
}

impl From<Dump> for Vec<CertificateSigningRequest> {
    fn from(dump: Dump) -> Self {
        match dump {
            Dump::List { items } => items,
            Dump::Bare(items) => items,
            Dump::Single(item) => vec![*item],
        }
    }
}

/// Read requests from a `.yaml`/`.yml` file, or JSON for any other extension.
pub fn load_requests(path: &Path) -> anyhow::Result<Vec<CertificateSigningRequest>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    let dump: Dump = if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))?
    };
    Ok(dump.into())
}

/// Decide on every request in `store`, one at a time, in name order.
///
/// A failed request does not stop the batch; its error is recorded in its
/// outcome and the request stays pending. Cancellation stops the batch
/// before the next request.
pub async fn run_batch(
    decider: &Decider,
    store: &dyn CsrStore,
    cancel: &CancellationToken,
) -> anyhow::Result<Vec<Outcome>> {
    let requests = store.list().await.context("failed to list requests")?;
    let mut outcomes = Vec::with_capacity(requests.len());

    for request in requests {
        if cancel.is_cancelled() {
            tracing::warn!(remaining = %request.name(), "batch cancelled");
            break;
        }

        let name = request.metadata.name.clone();
        let outcome = match decider.decide(store, request, cancel).await {
            Ok(decision) => Outcome {
                name,
                decision: Some(decision),
                error: None,
            },
            Err(e) => Outcome {
                name,
                decision: None,
                error: Some(e.to_string()),
            },
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
