//! Inspectors: named, configurable policy checks composed into a pipeline.
//!
//! A policy is written as `name[=config](,name[=config])*`. Each token is
//! resolved against the inspector [`Registry`], configured with the literal
//! text after its first `=`, and appended in order. The order of the tokens is
//! the order in which inspectors run.

pub mod group;
pub mod pem;
pub mod usages;
pub mod username;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::{ApprovalError, PolicyError};
use crate::models::csr::CertificateSigningRequest;
use crate::registry::Registry;
use crate::store::CsrStore;

/// A policy check over a single certificate signing request.
#[async_trait]
pub trait Inspector: Send + Sync {
    /// Build a configured copy of this inspector. The registered prototype is
    /// left untouched. Called once per pipeline build, never per request.
    fn configure(&self, config: &str) -> anyhow::Result<Arc<dyn Inspector>>;

    /// Check a request.
    ///
    /// - `Ok(None)` (or an empty message): no objection, continue
    /// - `Ok(Some(message))`: deny the request with `message`
    /// - `Err(_)`: no verdict right now; the request is left pending
    async fn inspect(
        &self,
        store: &dyn CsrStore,
        request: &CertificateSigningRequest,
    ) -> anyhow::Result<Option<String>>;
}

/// Register every built-in inspector.
pub fn register_builtins(registry: &Registry<dyn Inspector>) {
    registry.register("group", Arc::new(group::GroupInspector::default()));
    registry.register("pem", Arc::new(pem::PemInspector));
    registry.register("usages", Arc::new(usages::UsagesInspector::default()));
    registry.register("username", Arc::new(username::UsernameInspector::default()));
}

// ── Pipeline ─────────────────────────────────────────────────

/// One resolved policy token.
#[derive(Clone)]
pub struct NamedInspector {
    pub name: String,
    pub config: String,
    pub inspector: Arc<dyn Inspector>,
}

impl fmt::Debug for NamedInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedInspector")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Two entries are the same policy step when they name the same inspector
/// with the same configuration text.
impl PartialEq for NamedInspector {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.config == other.config
    }
}

/// The first objection raised by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Objection {
    pub inspector: String,
    pub message: String,
}

/// An ordered sequence of configured inspectors forming one policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inspectors(Vec<NamedInspector>);

impl Inspectors {
    /// Build a pipeline from a whole policy string.
    ///
    /// A blank policy yields an empty pipeline. Fails on the first unknown
    /// name or configuration error; nothing is built in that case.
    pub fn parse(registry: &Registry<dyn Inspector>, spec: &str) -> Result<Self, PolicyError> {
        let mut inspectors = Self::default();
        if spec.trim().is_empty() {
            return Ok(inspectors);
        }
        for token in spec.split(',') {
            inspectors.set(registry, token)?;
        }
        Ok(inspectors)
    }

    /// Resolve one `name[=config]` token and append it. On error the pipeline
    /// is left as it was.
    pub fn set(&mut self, registry: &Registry<dyn Inspector>, token: &str) -> Result<(), PolicyError> {
        // Whitespace around the name is dropped; the config is taken
        // literally.
        let (name, config) = match token.split_once('=') {
            Some((name, config)) => (name.trim(), config),
            None => (token.trim(), ""),
        };

        let prototype = registry
            .get(&name.to_lowercase())
            .ok_or_else(|| PolicyError::UnknownPlugin {
                kind: registry.kind(),
                name: name.to_string(),
                registered: registry.list(),
            })?;

        let inspector = if config.is_empty() {
            prototype
        } else {
            prototype
                .configure(config)
                .map_err(|source| PolicyError::Configure {
                    name: name.to_string(),
                    source,
                })?
        };

        self.0.push(NamedInspector {
            name: name.to_string(),
            config: config.to_string(),
            inspector,
        });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedInspector> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run every inspector in order and return the first objection.
    ///
    /// Stops at the first objection or the first error; later inspectors are
    /// never called in either case.
    pub async fn run(
        &self,
        store: &dyn CsrStore,
        request: &CertificateSigningRequest,
    ) -> Result<Option<Objection>, ApprovalError> {
        for named in &self.0 {
            let verdict = named
                .inspector
                .inspect(store, request)
                .await
                .map_err(|source| ApprovalError::Inspect {
                    inspector: named.name.clone(),
                    csr: request.name().to_string(),
                    source,
                })?;

            match verdict {
                Some(message) if !message.is_empty() => {
                    return Ok(Some(Objection {
                        inspector: named.name.clone(),
                        message,
                    }));
                }
                _ => {
                    tracing::trace!(csr = %request.name(), inspector = %named.name, "no objection");
                }
            }
        }
        Ok(None)
    }
}

/// Renders the policy back to `name[=config],...`.
impl fmt::Display for Inspectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, named) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            f.write_str(&named.name)?;
            if !named.config.is_empty() {
                write!(f, "={}", named.config)?;
            }
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    /// Accepts any config but "bad"; never objects.
    struct Echo;

    #[async_trait]
    impl Inspector for Echo {
        fn configure(&self, config: &str) -> anyhow::Result<Arc<dyn Inspector>> {
            if config == "bad" {
                anyhow::bail!("bad config");
            }
            Ok(Arc::new(Echo))
        }

        async fn inspect(
            &self,
            _store: &dyn CsrStore,
            _request: &CertificateSigningRequest,
        ) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    fn registry() -> Registry<dyn Inspector> {
        let reg: Registry<dyn Inspector> = Registry::new("inspector");
        for name in ["a", "b", "c", "x", "y"] {
            reg.register(name, Arc::new(Echo));
        }
        reg
    }

    fn names(p: &Inspectors) -> Vec<(&str, &str)> {
        p.iter().map(|n| (n.name.as_str(), n.config.as_str())).collect()
    }

    #[test]
    fn test_parse_preserves_order_and_config() {
        let p = Inspectors::parse(&registry(), "a,b=cfg,c").unwrap();
        assert_eq!(names(&p), vec![("a", ""), ("b", "cfg"), ("c", "")]);
    }

    #[test]
    fn test_config_splits_on_first_equals_only() {
        let p = Inspectors::parse(&registry(), "a=k=v=w").unwrap();
        assert_eq!(names(&p), vec![("a", "k=v=w")]);
    }

    #[test]
    fn test_config_is_kept_verbatim() {
        let p = Inspectors::parse(&registry(), " a=x , b = y").unwrap();
        assert_eq!(names(&p), vec![("a", "x "), ("b", " y")]);
        assert_eq!(p.to_string(), "a=x ,b= y");
    }

    #[test]
    fn test_unknown_name_fails_whole_build() {
        let reg = registry();
        reg.unregister("b");
        let err = Inspectors::parse(&reg, "a,b=cfg,c").unwrap_err();
        match err {
            PolicyError::UnknownPlugin { name, registered, .. } => {
                assert_eq!(name, "b");
                assert_eq!(registered, vec!["a", "c", "x", "y"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_configure_error_fails_whole_build() {
        let err = Inspectors::parse(&registry(), "a,b=bad").unwrap_err();
        assert!(matches!(err, PolicyError::Configure { ref name, .. } if name == "b"));
        assert!(err.to_string().contains("bad config"));
    }

    #[test]
    fn test_set_failure_leaves_pipeline_unchanged() {
        let reg = registry();
        let mut p = Inspectors::parse(&reg, "a").unwrap();
        assert!(p.set(&reg, "zzz").is_err());
        assert_eq!(names(&p), vec![("a", "")]);
        p.set(&reg, "c=1").unwrap();
        assert_eq!(p.to_string(), "a,c=1");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let p = Inspectors::parse(&registry(), "A=1").unwrap();
        assert_eq!(p.to_string(), "A=1");
    }

    #[test]
    fn test_blank_policy_is_empty_pipeline() {
        assert!(Inspectors::parse(&registry(), "").unwrap().is_empty());
        assert!(Inspectors::parse(&registry(), "  ").unwrap().is_empty());
    }

    #[test]
    fn test_empty_interior_token_is_unknown() {
        let err = Inspectors::parse(&registry(), "a,,b").unwrap_err();
        assert!(matches!(err, PolicyError::UnknownPlugin { ref name, .. } if name.is_empty()));
    }

    #[test]
    fn test_render_round_trip() {
        let reg = registry();
        let p = Inspectors::parse(&reg, "x=1,y").unwrap();
        assert_eq!(p.to_string(), "x=1,y");
        assert_eq!(Inspectors::parse(&reg, &p.to_string()).unwrap(), p);
    }

    #[test]
    fn test_configure_does_not_touch_prototype() {
        let reg = registry();
        let _ = Inspectors::parse(&reg, "a=configured").unwrap();
        let fresh = Inspectors::parse(&reg, "a").unwrap();
        let first = fresh.iter().next().unwrap();
        assert!(Arc::ptr_eq(&first.inspector, &reg.get("a").unwrap()));
    }

    #[tokio::test]
    async fn test_empty_pipeline_has_no_objection() {
        let store = MemoryStore::new();
        let req = CertificateSigningRequest::new("a", "u", vec![]);
        let verdict = Inspectors::default().run(&store, &req).await.unwrap();
        assert!(verdict.is_none());
    }
}
