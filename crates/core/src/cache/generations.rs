//! Store generation bookkeeping.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Create the generation if it does not exist yet.
    pub async fn open_generation(&self, tag: &str) -> Result<(), Error> {
        let tag = tag.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (tag, created_at) VALUES (?1, ?2)",
                    params![tag, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All generation tags, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT tag FROM generations ORDER BY created_at ASC, tag ASC")?;
                let tags = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry in it.
    ///
    /// Returns whether the generation existed.
    pub async fn delete_generation(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE tag = ?1", params![tag])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by a generation.
    pub async fn count_entries(&self, tag: &str) -> Result<u64, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![tag], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
