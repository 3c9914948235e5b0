use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Approver consulted when no inspector objects. Empty = inspectors only.
    /// Set via CSR_APPROVER_APPROVER. Default: "always".
    pub approver: String,
    /// Inspector policy, `name[=config]` tokens separated by commas.
    /// Set via CSR_APPROVER_INSPECTORS. Default: empty.
    pub inspectors: String,
    /// Update attempts before giving up on a contended request.
    /// Set via CSR_APPROVER_MAX_ATTEMPTS. Default: 5.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff_ms: self.base_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
            jitter_ms: self.jitter_ms,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            approver: "always".into(),
            inspectors: String::new(),
            max_attempts: retry.max_attempts,
            base_backoff_ms: retry.base_backoff_ms,
            max_backoff_ms: retry.max_backoff_ms,
            jitter_ms: retry.jitter_ms,
        }
    }
}

/// Load configuration from the environment (and a `.env` file if present).
pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary key lookup. Unset keys fall back to
/// defaults; set but unparsable numbers are an error.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    Ok(Config {
        approver: lookup("CSR_APPROVER_APPROVER").unwrap_or(defaults.approver),
        inspectors: lookup("CSR_APPROVER_INSPECTORS").unwrap_or(defaults.inspectors),
        max_attempts: parse_or(&lookup, "CSR_APPROVER_MAX_ATTEMPTS", defaults.max_attempts)?,
        base_backoff_ms: parse_or(&lookup, "CSR_APPROVER_BASE_BACKOFF_MS", defaults.base_backoff_ms)?,
        max_backoff_ms: parse_or(&lookup, "CSR_APPROVER_MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
        jitter_ms: parse_or(&lookup, "CSR_APPROVER_JITTER_MS", defaults.jitter_ms)?,
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number, got {:?}: {}", key, raw, e)),
        _ => Ok(default),
    }
}
