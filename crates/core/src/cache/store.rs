//! The Durable Store abstraction the engine is written against.
//!
//! Every operation is atomic per key. There is no locking above this layer;
//! concurrent writers to the same key resolve as last-write-wins.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::CacheEntry;
use crate::Error;

/// Versioned, named key-value container.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a generation if it does not exist.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// Enumerate generation tags.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation with all of its entries.
    async fn delete_generation(&self, generation: &str) -> Result<bool, Error>;

    async fn get(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error>;

    /// Atomically replace the entry stored under `entry.key`.
    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error>;

    /// Remove a key; removing an absent key is not an error.
    async fn delete(&self, generation: &str, key: &str) -> Result<bool, Error>;

    /// Keys starting with `prefix`, in discovery (insertion) order.
    async fn keys(&self, generation: &str, prefix: &str) -> Result<Vec<String>, Error>;
}

#[async_trait]
impl Store for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.open_generation(generation).await
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.list_generations().await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        CacheDb::delete_generation(self, generation).await
    }

    async fn get(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_entry(generation, key).await
    }

    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        self.put_entry(generation, entry).await
    }

    async fn delete(&self, generation: &str, key: &str) -> Result<bool, Error> {
        self.delete_entry(generation, key).await
    }

    async fn keys(&self, generation: &str, prefix: &str) -> Result<Vec<String>, Error> {
        self.entry_keys(generation, prefix).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_store_trait_object() {
        let store: Arc<dyn Store> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let entry = CacheEntry {
            key: "GET https://example.com/".into(),
            method: "GET".into(),
            url: "https://example.com/".into(),
            status: 200,
            headers: BTreeMap::new(),
            body: b"hi".to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };

        store.open("v1").await.unwrap();
        store.put("v1", &entry).await.unwrap();
        assert_eq!(store.get("v1", &entry.key).await.unwrap(), Some(entry.clone()));
        assert_eq!(store.keys("v1", "GET ").await.unwrap(), vec![entry.key.clone()]);
        assert!(store.delete("v1", &entry.key).await.unwrap());
        assert!(store.delete_generation("v1").await.unwrap());
        assert!(store.generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_distinct_keys() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut handles = Vec::new();
        for i in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let entry = CacheEntry {
                    key: format!("GET https://example.com/{i}"),
                    method: "GET".into(),
                    url: format!("https://example.com/{i}"),
                    status: 200,
                    headers: BTreeMap::new(),
                    body: i.to_string().into_bytes(),
                    stored_at: chrono::Utc::now().to_rfc3339(),
                };
                db.put("v1", &entry).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(db.keys("v1", "GET ").await.unwrap().len(), 16);
        let seven = db.get("v1", "GET https://example.com/7").await.unwrap().unwrap();
        assert_eq!(seven.body, b"7");
    }
}
