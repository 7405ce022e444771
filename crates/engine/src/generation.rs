//! Cache generation lifecycle: precache on install, evict on activate.

use futures_util::future::try_join_all;
use swcache_client::Network;
use swcache_core::{CacheDb, Error, Request, RequestKey, Response};
use url::Url;

/// Owns the generation of one worker version.
#[derive(Debug, Clone)]
pub struct GenerationManager {
    store: CacheDb,
    cache_name: String,
    manifest: Vec<Url>,
}

impl GenerationManager {
    pub fn new(store: CacheDb, cache_name: impl Into<String>, manifest: Vec<Url>) -> Self {
        Self { store, cache_name: cache_name.into(), manifest }
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Fetch every manifest asset and store them all in this generation.
    ///
    /// Fetches run concurrently. Nothing is written unless every asset
    /// arrives with a 2xx status; the generation and its entries are then
    /// committed in one transaction. Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` naming the first asset that failed, or
    /// a database error if the commit fails.
    pub async fn populate(&self, network: &dyn Network) -> Result<usize, Error> {
        let fetches = self.manifest.iter().map(|url| fetch_asset(network, url));
        let entries = try_join_all(fetches).await?;

        self.store.populate_generation(&self.cache_name, &entries).await?;
        tracing::info!(cache = %self.cache_name, entries = entries.len(), "generation populated");
        Ok(entries.len())
    }

    /// Record this generation as the active one for `version`, so a later
    /// process can resume from it offline.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the generation no longer exists.
    pub async fn mark_active(&self, version: &str) -> Result<(), Error> {
        if !self.store.set_active_generation(&self.cache_name, version).await? {
            return Err(Error::InvalidState(format!("generation {} is missing", self.cache_name)));
        }
        Ok(())
    }

    /// Check that this generation survives on disk, for resuming without
    /// an install.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the generation does not exist.
    pub async fn ensure_present(&self) -> Result<(), Error> {
        if !self.store.has_generation(&self.cache_name).await? {
            return Err(Error::InvalidState(format!("generation {} is missing", self.cache_name)));
        }
        Ok(())
    }

    /// Delete every generation other than this one.
    ///
    /// Returns the deleted names. An empty result on activation means a
    /// fresh install rather than an upgrade.
    pub async fn remove_stale(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.generation_names().await? {
            if name == self.cache_name {
                continue;
            }
            if self.store.delete_generation(&name).await? {
                tracing::info!(cache = %name, "deleted stale generation");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

async fn fetch_asset(network: &dyn Network, url: &Url) -> Result<(RequestKey, Response), Error> {
    let request = Request::get(url.clone());
    let response = network.fetch(&request).await.map_err(|e| Error::InstallFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !response.is_ok() {
        return Err(Error::InstallFailed { url: url.to_string(), reason: format!("status {}", response.status) });
    }
    Ok((RequestKey::for_request(&request), response))
}
