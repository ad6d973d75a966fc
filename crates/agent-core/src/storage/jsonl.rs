use crate::agent::Thread;
use crate::storage::{Result, StorageError, ThreadStore};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores each thread as `<base>/<thread_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonlThreadStore {
    base_path: PathBuf,
}

impl JsonlThreadStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool> {
        match fs::remove_file(self.thread_path(thread_id)?).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(StorageError::Io(error)),
        }
    }

    /// Ids become file names, so anything that could leave `base_path` is rejected.
    fn thread_path(&self, thread_id: &str) -> Result<PathBuf> {
        if thread_id.is_empty()
            || thread_id.contains(['/', '\\'])
            || thread_id.contains("..")
        {
            return Err(StorageError::InvalidThreadId(thread_id.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", thread_id)))
    }
}

#[async_trait::async_trait]
impl ThreadStore for JsonlThreadStore {
    async fn load_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let path = self.thread_path(thread_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save_thread(&self, thread: &Thread) -> Result<()> {
        let json = serde_json::to_string(thread)?;
        fs::write(self.thread_path(&thread.id)?, json).await?;
        Ok(())
    }
}
