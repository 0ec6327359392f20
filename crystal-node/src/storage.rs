//durable key-value store used for the startup load of every shard and for root persistence,
//keyed by shard address

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;

#[async_trait]
pub trait DurableStore: Send + Sync + 'static {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.entries.insert(id.to_string(), bytes);
        Ok(())
    }
}

//one json file per shard under `root`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(FileStore { root })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let mut name = String::with_capacity(id.len());
        for b in id.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                name.push(char::from(b));
            } else {
                name.push_str(&format!("%{b:02x}"));
            }
        }
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        //write-then-rename so a crash never leaves a half written shard behind
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("hits").await.unwrap(), None);

        store.put("hits", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("hits").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("hits:3:1").await.unwrap(), None);
        store.put("hits:3:1", b"{\"a\":1}".to_vec()).await.unwrap();

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("hits:3:1").await.unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
        //colons are escaped in file names, distinct addresses stay distinct files
        assert_eq!(reopened.get("hits:3").await.unwrap(), None);
    }
}
