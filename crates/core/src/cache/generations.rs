//! Generation and entry operations.
//!
//! A generation is a named set of cached responses owned by one deployed
//! version. Entries are addressed by [`RequestKey`] and deleted together
//! with their generation.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::RequestKey;
use crate::response::{Response, ResponseKind};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// Summary of a stored generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

/// Row values of one entry, encoded outside the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    kind: &'static str,
    final_url: Option<String>,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn encode(key: &RequestKey, response: &Response) -> Result<Self, Error> {
        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
        Ok(Self {
            key_hash: key.hash.clone(),
            method: key.method.clone(),
            url: key.url.clone(),
            status: response.status,
            kind: response.kind.as_str(),
            final_url: response.url.clone(),
            headers_json,
            body: response.body.to_vec(),
        })
    }
}

const UPSERT_GENERATION: &str = "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
     ON CONFLICT(name) DO NOTHING";

const ENTRY_UPDATE: &str = "ON CONFLICT(generation, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status = excluded.status,
        kind = excluded.kind,
        final_url = excluded.final_url,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

const ENTRY_COLUMNS: &str =
    "generation, key_hash, method, url, status, kind, final_url, headers_json, body, stored_at";

/// Insert or replace one entry. With `require_generation` the row is only
/// written while the generation exists. Returns the number of rows written.
fn insert_entry(
    conn: &rusqlite::Connection, generation: &str, row: &EntryRow, now: &str, require_generation: bool,
) -> Result<usize, Error> {
    let sql = if require_generation {
        format!(
            "INSERT INTO entries ({ENTRY_COLUMNS})
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
             WHERE EXISTS (SELECT 1 FROM generations WHERE name = ?1)
             {ENTRY_UPDATE}"
        )
    } else {
        format!("INSERT INTO entries ({ENTRY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) {ENTRY_UPDATE}")
    };
    let written = conn.execute(
        &sql,
        params![
            generation,
            &row.key_hash,
            &row.method,
            &row.url,
            row.status,
            row.kind,
            &row.final_url,
            &row.headers_json,
            &row.body,
            now,
        ],
    )?;
    Ok(written)
}

impl CacheDb {
    /// Open a generation, creating it if absent.
    pub async fn open_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(UPSERT_GENERATION, params![name, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a generation exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All generation names, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Generation names with creation time and entry count, oldest first.
    pub async fn generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, COUNT(e.key_hash)
                     FROM generations g LEFT JOIN entries e ON e.generation = g.name
                     GROUP BY g.name
                     ORDER BY g.created_at ASC, g.name ASC",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(GenerationInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Create (or reopen) a generation and store every entry in one
    /// transaction. Either all entries become visible or none do.
    pub async fn populate_generation(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let name = name.to_string();
        let rows = entries
            .iter()
            .map(|(key, response)| EntryRow::encode(key, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(UPSERT_GENERATION, params![name, now])?;
                for row in &rows {
                    insert_entry(&tx, &name, row, &now, false)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a single entry in an existing generation.
    ///
    /// Returns false, writing nothing, if the generation does not exist.
    /// Only [`CacheDb::populate_generation`] and [`CacheDb::open_generation`]
    /// create generations.
    pub async fn put_entry(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<bool, Error> {
        let generation = generation.to_string();
        let row = EntryRow::encode(key, response)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let written = insert_entry(conn, &generation, &row, &now, true)?;
                Ok(written > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry in one generation.
    ///
    /// Returns None if the generation or the entry doesn't exist.
    pub async fn match_entry(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let generation = generation.to_string();
        let key_hash = key.hash.clone();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, kind, final_url, headers_json, body
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                });

                match result {
                    Ok((status, kind, final_url, headers_json, body)) => {
                        let kind = ResponseKind::parse(&kind)
                            .ok_or_else(|| Error::CorruptEntry(format!("unknown response kind: {kind}")))?;
                        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
                        Ok(Some(Response { status, headers, body: body.into(), kind, url: final_url }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every entry in a generation, sorted.
    pub async fn entry_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
