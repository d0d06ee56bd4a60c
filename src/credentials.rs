//! Bot secret resolution from the environment or a `.env` file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// The Direct Line bot secret.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Secret").field(&"[REDACTED]").finish()
    }
}

impl Secret {
    /// Wrap a raw secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for building the bearer header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Resolve the secret named `key`.
///
/// Checks `env` first, then the key-value pairs of `dotenv_path` when it
/// exists. Empty values are treated as missing.
///
/// # Errors
///
/// Returns an error when the `.env` file cannot be parsed or no non-empty
/// value is found.
pub fn resolve_secret(
    key: &str,
    env: impl Fn(&str) -> Option<String>,
    dotenv_path: Option<&Path>,
) -> anyhow::Result<Secret> {
    if let Some(value) = env(key).filter(|v| !v.is_empty()) {
        debug!(key, "secret resolved from environment");
        return Ok(Secret::new(value));
    }

    if let Some(path) = dotenv_path.filter(|p| p.exists()) {
        let vars = load_dotenv(path)?;
        if let Some(value) = vars.get(key).filter(|v| !v.is_empty()) {
            debug!(key, path = %path.display(), "secret resolved from dotenv file");
            return Ok(Secret::new(value.clone()));
        }
    }

    Err(anyhow::anyhow!(
        "missing bot secret: set {key} in the environment or a .env file"
    ))
}

/// Resolve the secret from the process environment and `./.env`.
///
/// # Errors
///
/// See [`resolve_secret`].
pub fn resolve_default_secret(key: &str) -> anyhow::Result<Secret> {
    resolve_secret(key, |k| std::env::var(k).ok(), Some(Path::new(".env")))
}

fn load_dotenv(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, value) = item.with_context(|| {
            format!("failed to parse key-value entry in {}", path.display())
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}
