use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── CertificateSigningRequest ────────────────────────────────

/// A certificate signing request as stored in the backing store.
///
/// Field names follow the cluster's camelCase wire format so objects can be
/// loaded verbatim from JSON or YAML dumps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSigningRequest {
    pub metadata: ObjectMeta,
    pub spec: CsrSpec,
    #[serde(default)]
    pub status: CsrStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    /// Opaque version stamp set by the store on every write. Only ever
    /// compared for equality; an update carrying a stale version is rejected
    /// as a conflict.
    #[serde(default)]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrSpec {
    /// Base64-encoded PEM `CERTIFICATE REQUEST` block.
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub usages: Vec<KeyUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrStatus {
    #[serde(default)]
    pub conditions: Vec<CsrCondition>,
}

impl CertificateSigningRequest {
    pub fn new(name: impl Into<String>, username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                uid: Some(Uuid::new_v4()),
                resource_version: String::new(),
                creation_timestamp: Some(Utc::now()),
            },
            spec: CsrSpec {
                username: username.into(),
                groups,
                ..Default::default()
            },
            status: CsrStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// A request carrying any condition has already been approved or denied.
    pub fn is_decided(&self) -> bool {
        !self.status.conditions.is_empty()
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.spec.groups.iter().any(|g| g == group)
    }
}

// ── Conditions ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Approved,
    Denied,
    /// Set by the signer when issuance failed. Never written here.
    Failed,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Approved => f.write_str("Approved"),
            ConditionType::Denied => f.write_str("Denied"),
            ConditionType::Failed => f.write_str("Failed"),
        }
    }
}

/// Terminal decision record appended to a request. Final once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrCondition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl CsrCondition {
    pub fn approved(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_: ConditionType::Approved,
            reason: reason.into(),
            message: message.into(),
            last_update_time: Some(Utc::now()),
        }
    }

    pub fn denied(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_: ConditionType::Denied,
            reason: reason.into(),
            message: message.into(),
            last_update_time: Some(Utc::now()),
        }
    }
}

// ── Key Usages ───────────────────────────────────────────────

/// Usage a CSR asks the issued certificate to carry.
///
/// Unknown strings round-trip through `Other` so a store object is never
/// rejected at load time; inspectors decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
    ServerAuth,
    ClientAuth,
    Other(String),
}

impl KeyUsage {
    pub fn as_str(&self) -> &str {
        match self {
            KeyUsage::DigitalSignature => "digital signature",
            KeyUsage::KeyEncipherment => "key encipherment",
            KeyUsage::ServerAuth => "server auth",
            KeyUsage::ClientAuth => "client auth",
            KeyUsage::Other(s) => s,
        }
    }
}

impl From<&str> for KeyUsage {
    fn from(s: &str) -> Self {
        match s {
            "digital signature" => KeyUsage::DigitalSignature,
            "key encipherment" => KeyUsage::KeyEncipherment,
            "server auth" => KeyUsage::ServerAuth,
            "client auth" => KeyUsage::ClientAuth,
            other => KeyUsage::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for KeyUsage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyUsage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(KeyUsage::from(s.as_str()))
    }
}
