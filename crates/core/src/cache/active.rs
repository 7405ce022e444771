//! The persisted active generation.
//!
//! Activation records which generation now serves requests, so a restarted
//! process can resume from the on-disk cache when install cannot reach the
//! network. The record cascades with its generation: deleting the generation
//! clears it.

use super::{CacheDb, Error};
use tokio_rusqlite::{params, rusqlite::OptionalExtension};

/// The generation recorded by the last successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGeneration {
    pub cache_name: String,
    pub version: String,
    pub activated_at: String,
}

impl CacheDb {
    /// Record `cache_name` as the active generation for `version`.
    ///
    /// Returns false, recording nothing, if the generation does not exist.
    pub async fn set_active_generation(&self, cache_name: &str, version: &str) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        let version = version.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let written = conn.execute(
                    "INSERT INTO active_generation (id, cache_name, version, activated_at)
                     SELECT 1, ?1, ?2, ?3
                     WHERE EXISTS (SELECT 1 FROM generations WHERE name = ?1)
                     ON CONFLICT(id) DO UPDATE SET
                        cache_name = excluded.cache_name,
                        version = excluded.version,
                        activated_at = excluded.activated_at",
                    params![cache_name, version, now],
                )?;
                Ok(written > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// The generation recorded by the last activation, if it still exists.
    pub async fn active_generation(&self) -> Result<Option<ActiveGeneration>, Error> {
        self.conn
            .call(|conn| -> Result<Option<ActiveGeneration>, Error> {
                let active = conn
                    .query_row(
                        "SELECT cache_name, version, activated_at FROM active_generation WHERE id = 1",
                        [],
                        |row| {
                            Ok(ActiveGeneration {
                                cache_name: row.get(0)?,
                                version: row.get(1)?,
                                activated_at: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(active)
            })
            .await
            .map_err(Error::from)
    }
}
