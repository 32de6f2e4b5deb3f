//! On-disk token cache used by the identity provider sign-in.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, io::ErrorKind, path::PathBuf};
use tokio::fs;
use yup_oauth2::storage::{TokenInfo, TokenStorage, TokenStorageError};

/// Persists issued tokens in a local JSON file, keyed by scope set.
#[derive(Clone)]
pub struct DiskTokenCache {
    /// Location of the cache file on disk.
    path: PathBuf,
}

/// Map stored in the cache file.
type TokenMap = HashMap<String, TokenInfo>;

impl DiskTokenCache {
    /// Create a cache backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Order-insensitive key for a scope set.
    fn entry_key(scopes: &[&str]) -> String {
        let mut v: Vec<&str> = scopes.to_vec();
        v.sort_unstable();
        v.dedup();
        let digest = Sha256::digest(v.join(" ").as_bytes());
        format!("token:{}", URL_SAFE_NO_PAD.encode(digest))
    }

    /// Read the whole cache; a missing or empty file is an empty cache.
    async fn load(&self) -> Result<TokenMap, TokenStorageError> {
        match fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(TokenMap::new()),
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| TokenStorageError::Other(e.to_string().into())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TokenMap::new()),
            Err(e) => Err(TokenStorageError::Other(e.to_string().into())),
        }
    }

    /// Write the cache via a temp file so a crash never truncates it.
    async fn persist(&self, map: &TokenMap) -> Result<(), TokenStorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TokenStorageError::Other(e.to_string().into()))?;
        }
        let data = serde_json::to_vec_pretty(map)
            .map_err(|e| TokenStorageError::Other(e.to_string().into()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &data)
            .await
            .map_err(|e| TokenStorageError::Other(e.to_string().into()))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| TokenStorageError::Other(e.to_string().into()))?;
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for DiskTokenCache {
    /// Store or replace the token for the given scopes.
    async fn set(&self, scopes: &[&str], token: TokenInfo) -> Result<(), TokenStorageError> {
        let mut map = self.load().await?;
        map.insert(Self::entry_key(scopes), token);
        self.persist(&map).await
    }

    /// Retrieve the token for the given scopes, if present.
    async fn get(&self, scopes: &[&str]) -> Option<TokenInfo> {
        let mut map = self.load().await.ok()?;
        map.remove(&Self::entry_key(scopes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_key_ignores_scope_order_and_duplicates() {
        let a = DiskTokenCache::entry_key(&["openid", "email", "profile"]);
        let b = DiskTokenCache::entry_key(&["profile", "openid", "email", "openid"]);
        assert_eq!(a, b);
        let c = DiskTokenCache::entry_key(&["openid"]);
        assert_ne!(a, c);
    }
}
