use thiserror::Error;

/// Misuse of a plugin registry. `Registry::register` panics on these;
/// `Registry::try_register` hands them back instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind}: could not register a plugin with an empty name")]
    EmptyName { kind: &'static str },

    #[error("{kind}: plugin {name:?} registered twice")]
    Duplicate { kind: &'static str, name: String },
}

/// Failure to turn a policy string into a ready-to-run pipeline.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("could not find {kind} {name:?}, registered {kind}s: {}", .registered.join(","))]
    UnknownPlugin {
        kind: &'static str,
        name: String,
        registered: Vec<String>,
    },

    #[error("failed to configure {name:?}: {source}")]
    Configure {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced by a [`crate::store::CsrStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("certificate signing request {name:?} not found")]
    NotFound { name: String },

    /// Optimistic-concurrency rejection: the stored object is newer than the
    /// one the caller tried to write.
    #[error("conflict updating {name:?}: the object has been modified")]
    Conflict { name: String },

    #[error("store error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Errors from deciding on a single request.
///
/// None of these leave a condition behind: the request stays pending and is
/// re-evaluated on the next run.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// An inspector could not reach a verdict right now.
    #[error("inspector {inspector:?} deferred {csr:?}: {source}")]
    Inspect {
        inspector: String,
        csr: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("gave up updating {name:?} after {attempts} conflicting attempts")]
    RetryExhausted { name: String, attempts: u32 },

    #[error("update of {name:?} cancelled")]
    Cancelled { name: String },
}

impl ApprovalError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalError::Inspect { .. } => "deferred",
            ApprovalError::Store(_) => "store_error",
            ApprovalError::RetryExhausted { .. } => "retry_exhausted",
            ApprovalError::Cancelled { .. } => "cancelled",
        }
    }
}
