//! Structural check of the PEM payload carried in `spec.request`.
//!
//! The request must be base64 that decodes to exactly one
//! `CERTIFICATE REQUEST` PEM block whose body is itself valid base64.
//! Parsing the DER inside is left to the issuing side.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::Inspector;
use crate::models::csr::CertificateSigningRequest;
use crate::store::CsrStore;

const BLOCK_TYPE: &str = "CERTIFICATE REQUEST";

#[derive(Debug, Clone, Copy, Default)]
pub struct PemInspector;

#[async_trait]
impl Inspector for PemInspector {
    fn configure(&self, config: &str) -> anyhow::Result<Arc<dyn Inspector>> {
        anyhow::bail!("pem takes no configuration, got {:?}", config)
    }

    async fn inspect(
        &self,
        _store: &dyn CsrStore,
        request: &CertificateSigningRequest,
    ) -> anyhow::Result<Option<String>> {
        Ok(check_request(&request.spec.request).err())
    }
}

/// `Err(message)` describes why the payload is unacceptable.
fn check_request(encoded: &str) -> Result<(), String> {
    let compact: String = encoded.split_whitespace().collect();
    let raw = STANDARD
        .decode(compact)
        .map_err(|e| format!("request is not valid base64: {}", e))?;
    let text = String::from_utf8(raw).map_err(|_| "request is not a PEM document".to_string())?;

    let begin = format!("-----BEGIN {}-----", BLOCK_TYPE);
    let end = format!("-----END {}-----", BLOCK_TYPE);

    let mut blocks = 0;
    let mut body: Option<String> = None;
    for line in text.lines().map(str::trim) {
        if line.starts_with("-----BEGIN ") {
            if line != begin {
                return Err(format!("unexpected PEM block {:?}", line));
            }
            if body.is_some() {
                return Err("nested PEM block".to_string());
            }
            blocks += 1;
            body = Some(String::new());
        } else if line.starts_with("-----END ") {
            let content = body
                .take()
                .ok_or_else(|| format!("unmatched {:?}", line))?;
            if line != end {
                return Err(format!("unexpected PEM trailer {:?}", line));
            }
            if content.is_empty() {
                return Err("empty PEM block".to_string());
            }
            STANDARD
                .decode(&content)
                .map_err(|e| format!("PEM body is not valid base64: {}", e))?;
        } else if let Some(content) = body.as_mut() {
            content.push_str(line);
        }
    }

    if body.is_some() {
        return Err("unterminated PEM block".to_string());
    }
    match blocks {
        1 => Ok(()),
        0 => Err(format!("request does not contain a {} PEM block", BLOCK_TYPE)),
        n => Err(format!("request contains {} PEM blocks, expected one", n)),
    }
}
