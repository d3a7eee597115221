//! Entry CRUD operations.
//!
//! An entry maps a request identity to a response snapshot inside one store
//! generation. Writes are single-statement upserts, so a concurrent reader of
//! the same key sees either the old or the new row.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored snapshot.
///
/// For cached responses `status`, `headers` and `body` describe the response.
/// For queued mutations they describe the request to resend and `status` is 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheDb {
    /// Insert or replace an entry in `generation`.
    ///
    /// The generation is created on first write.
    pub async fn put_entry(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        let generation = generation.to_string();
        let entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.headers)?;
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (tag, created_at) VALUES (?1, ?2)",
                    params![&generation, &created_at],
                )?;
                conn.execute(
                    "INSERT INTO entries (
                    generation, key, method, url, status, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(generation, key) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &generation,
                        &entry.key,
                        &entry.method,
                        &entry.url,
                        entry.status as i64,
                        &headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key.
    ///
    /// Returns None if the key doesn't exist in the generation.
    pub async fn get_entry(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, headers_json, body, stored_at
                FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                match result {
                    Ok((key, method, url, status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        let status = u16::try_from(status)
                            .map_err(|_| Error::CorruptEntry(format!("status {status} out of range for {key}")))?;
                        Ok(Some(CacheEntry { key, method, url, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an entry. Returns whether a row was removed.
    pub async fn delete_entry(&self, generation: &str, key: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM entries WHERE generation = ?1 AND key = ?2", params![generation, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Keys starting with `prefix`, in insertion order.
    ///
    /// Overwriting a key keeps its original position.
    pub async fn entry_keys(&self, generation: &str, prefix: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key FROM entries
                WHERE generation = ?1 AND substr(key, 1, length(?2)) = ?2
                ORDER BY rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![generation, prefix], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(key: &str, body: &str) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            method: "GET".to_string(),
            url: key.trim_start_matches("GET ").to_string(),
            status: 200,
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: body.as_bytes().to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("GET https://example.com/a.json", r#"{"ok":true}"#);

        db.put_entry("v1", &entry).await.unwrap();

        let retrieved = db.get_entry("v1", &entry.key).await.unwrap().unwrap();
        assert_eq!(retrieved, entry);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_entry("v1", "GET https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("GET https://example.com/a", "1")).await.unwrap();
        db.put_entry("v1", &make_entry("GET https://example.com/a", "2")).await.unwrap();

        let retrieved = db.get_entry("v1", "GET https://example.com/a").await.unwrap().unwrap();
        assert_eq!(retrieved.body, b"2");
    }

    #[tokio::test]
    async fn test_entries_scoped_by_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("GET https://example.com/a", "old")).await.unwrap();

        assert!(db.get_entry("v2", "GET https://example.com/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("GET https://example.com/a", "x")).await.unwrap();

        assert!(db.delete_entry("v1", "GET https://example.com/a").await.unwrap());
        assert!(!db.delete_entry("v1", "GET https://example.com/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_prefix_in_insertion_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("mutation-queue/2", "b")).await.unwrap();
        db.put_entry("v1", &make_entry("GET https://example.com/", "x")).await.unwrap();
        db.put_entry("v1", &make_entry("mutation-queue/1", "a")).await.unwrap();
        db.put_entry("v1", &make_entry("mutation-queue/2", "b2")).await.unwrap();

        let keys = db.entry_keys("v1", "mutation-queue/").await.unwrap();
        assert_eq!(keys, vec!["mutation-queue/2".to_string(), "mutation-queue/1".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_prefix_is_literal() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("queue_%1", "a")).await.unwrap();
        db.put_entry("v1", &make_entry("queueX1", "b")).await.unwrap();

        let keys = db.entry_keys("v1", "queue_%").await.unwrap();
        assert_eq!(keys, vec!["queue_%1".to_string()]);
    }
}
