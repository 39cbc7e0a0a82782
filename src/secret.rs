//! The secret adapter contract (§4.3). Pinned here because the settings
//! loader depends on it directly, even though a secret adapter is itself
//! resolved like any other capability through the DI container.
//!
//! Grounded on `acb/adapters/secret/_base.py`'s `SecretBase` trait shape
//! (`list`/`get`/`delete`/`list_versions`, a `prefix` that scopes every
//! operation) plus the spec's `set`/`exists` additions.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::AcbError;

/// A pluggable secret store. One implementation is enabled per process.
///
/// `prefix` scopes every operation to `<app-name>_`; implementations must
/// not read or write outside it. Name normalization (e.g. substituting
/// hyphens for underscores) is backend-specific and must be applied
/// symmetrically on write and read so callers always see the canonical
/// underscore form.
pub trait SecretAdapter: Send + Sync {
    /// The prefix every secret name is scoped under, e.g. `"myapp_"`.
    fn prefix(&self) -> &str;

    /// Enumerate known secret names, optionally filtered by category
    /// prefix (applied in addition to `prefix()`).
    fn list(
        &self,
        category: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<String>, AcbError>> + Send;

    /// Returns the plaintext for the latest version, or a named version.
    /// Returns `Ok(None)` (not an error) when the secret does not exist.
    fn get(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<String>, AcbError>> + Send;

    /// Create or update a secret. Idempotent.
    fn set(
        &self,
        name: &str,
        plaintext: &str,
    ) -> impl std::future::Future<Output = Result<(), AcbError>> + Send;

    /// Idempotent; deleting an absent secret is not an error.
    fn delete(&self, name: &str) -> impl std::future::Future<Output = Result<(), AcbError>> + Send;

    /// May return empty if the backend does not support versioning.
    /// Version identifiers are preserved verbatim (see Open Questions).
    fn list_versions(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, AcbError>> + Send;

    /// Convenience probe built on top of `get`.
    fn exists(&self, name: &str) -> impl std::future::Future<Output = Result<bool, AcbError>> + Send {
        async move { Ok(self.get(name, None).await?.is_some()) }
    }
}

/// In-process reference implementation. Suitable as the library-mode
/// default and for the core's own tests; production backends (Cloudflare,
/// Infisical, cloud secret managers) implement the same trait out of tree
/// and are explicitly out of scope for this core (§1).
pub struct MemorySecretAdapter {
    prefix: String,
    secrets: RwLock<HashMap<String, Vec<String>>>,
}

impl MemorySecretAdapter {
    pub fn new(app_name: &str) -> Self {
        Self {
            prefix: format!("{app_name}_"),
            secrets: RwLock::new(HashMap::new()),
        }
    }
}

impl SecretAdapter for MemorySecretAdapter {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<String>, AcbError> {
        let secrets = self.secrets.read().await;
        let mut names: Vec<String> = secrets
            .keys()
            .filter(|name| {
                category.map_or(true, |cat| {
                    name.starts_with(&format!("{}{cat}_", self.prefix))
                })
            })
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, name: &str, version: Option<&str>) -> Result<Option<String>, AcbError> {
        let secrets = self.secrets.read().await;
        let Some(versions) = secrets.get(name) else {
            return Ok(None);
        };
        match version {
            Some(v) => Ok(v.parse::<usize>().ok().and_then(|i| versions.get(i).cloned())),
            None => Ok(versions.last().cloned()),
        }
    }

    async fn set(&self, name: &str, plaintext: &str) -> Result<(), AcbError> {
        let mut secrets = self.secrets.write().await;
        secrets.entry(name.to_string()).or_default().push(plaintext.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), AcbError> {
        let mut secrets = self.secrets.write().await;
        secrets.remove(name);
        Ok(())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>, AcbError> {
        let secrets = self.secrets.read().await;
        Ok(secrets
            .get(name)
            .map(|versions| (0..versions.len()).map(|i| i.to_string()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_secret_is_none_not_error() {
        let adapter = MemorySecretAdapter::new("myapp");
        assert_eq!(adapter.get("myapp_cache_password", None).await.unwrap(), None);
        assert!(!adapter.exists("myapp_cache_password").await.unwrap());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let adapter = MemorySecretAdapter::new("myapp");
        adapter.set("myapp_cache_password", "hunter2").await.unwrap();
        assert_eq!(
            adapter.get("myapp_cache_password", None).await.unwrap(),
            Some("hunter2".to_string())
        );
        assert!(adapter.exists("myapp_cache_password").await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let adapter = MemorySecretAdapter::new("myapp");
        adapter.set("myapp_cache_password", "hunter2").await.unwrap();
        adapter.delete("myapp_cache_password").await.unwrap();
        adapter.delete("myapp_cache_password").await.unwrap();
        assert_eq!(adapter.get("myapp_cache_password", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_twice_keeps_version_history() {
        let adapter = MemorySecretAdapter::new("myapp");
        adapter.set("myapp_cache_password", "v0").await.unwrap();
        adapter.set("myapp_cache_password", "v1").await.unwrap();
        assert_eq!(
            adapter.get("myapp_cache_password", None).await.unwrap(),
            Some("v1".to_string())
        );
        assert_eq!(
            adapter.get("myapp_cache_password", Some("0")).await.unwrap(),
            Some("v0".to_string())
        );
        assert_eq!(
            adapter.list_versions("myapp_cache_password").await.unwrap(),
            vec!["0".to_string(), "1".to_string()]
        );
    }

    #[tokio::test]
    async fn list_filters_by_category() {
        let adapter = MemorySecretAdapter::new("myapp");
        adapter.set("myapp_cache_password", "x").await.unwrap();
        adapter.set("myapp_sql_password", "y").await.unwrap();
        assert_eq!(
            adapter.list(Some("cache")).await.unwrap(),
            vec!["myapp_cache_password".to_string()]
        );
        assert_eq!(adapter.list(None).await.unwrap().len(), 2);
    }
}
