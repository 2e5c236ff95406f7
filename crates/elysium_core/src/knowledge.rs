//! On-disk knowledge documents mirrored in memory.
//!
//! Each document is a `<name>.txt` file under the store directory. The
//! in-memory map is a read-through mirror: mutations touch the file first and
//! only update memory once the file operation succeeded, so a persistence
//! failure leaves the cached set unchanged.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{CoreError, Result};

const DOC_EXTENSION: &str = "txt";

/// Named reference texts used to ground model responses.
#[derive(Debug)]
pub struct KnowledgeStore {
    directory: PathBuf,
    documents: RwLock<HashMap<String, String>>,
}

impl KnowledgeStore {
    /// Open the store, creating the directory if needed and loading every
    /// `.txt` document in it.
    pub async fn load(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| CoreError::knowledge_io(&directory, e))?;

        let store = Self {
            directory,
            documents: RwLock::new(HashMap::new()),
        };
        let count = store.reload().await?;
        info!("loaded {count} knowledge documents from {}", store.directory.display());
        Ok(store)
    }

    /// Replace the entire in-memory set from disk. Returns the new count.
    pub async fn reload(&self) -> Result<usize> {
        let mut fresh = HashMap::new();
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| CoreError::knowledge_io(&self.directory, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::knowledge_io(&self.directory, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    fresh.insert(name.to_string(), content);
                }
                Err(e) => {
                    // One unreadable file should not block the rest of the set.
                    warn!("skipping unreadable knowledge document {}: {e}", path.display());
                }
            }
        }

        let count = fresh.len();
        *self.documents.write().await = fresh;
        Ok(count)
    }

    /// Add (or overwrite) a document: persist the file, then mirror it.
    pub async fn add(&self, name: &str, content: &str) -> Result<()> {
        validate_name(name)?;
        let path = self.document_path(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| CoreError::knowledge_io(&path, e))?;

        self.documents
            .write()
            .await
            .insert(name.to_string(), content.to_string());
        info!("added knowledge document '{name}' ({} chars)", content.chars().count());
        Ok(())
    }

    /// Remove a document: delete the file, then evict the mirror entry.
    /// Returns false when no such document exists.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        if !self.documents.read().await.contains_key(name) {
            return Ok(false);
        }

        let path = self.document_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            // Already gone on disk; still drop the stale mirror entry.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CoreError::knowledge_io(&path, e)),
        }

        self.documents.write().await.remove(name);
        info!("removed knowledge document '{name}'");
        Ok(true)
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.documents.read().await.get(name).cloned()
    }

    /// `(name, content length in chars, preview)` for every document, sorted by name.
    pub async fn entries(&self) -> Vec<(String, usize, String)> {
        let docs = self.documents.read().await;
        let mut entries: Vec<_> = docs
            .iter()
            .map(|(name, content)| {
                let preview = if content.chars().count() > 100 {
                    let mut cut: String = content.chars().take(100).collect();
                    cut.push_str("...");
                    cut
                } else {
                    content.clone()
                };
                (name.clone(), content.chars().count(), preview)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.documents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Every document concatenated for prompting, or None when the store is
    /// empty. Documents are ordered by name so prompts are deterministic.
    pub async fn combined_context(&self) -> Option<String> {
        let docs = self.documents.read().await;
        if docs.is_empty() {
            return None;
        }
        let mut names: Vec<&String> = docs.keys().collect();
        names.sort();
        let combined = names
            .into_iter()
            .map(|name| format!("# {name}\n{}", docs[name]))
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(combined)
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.{DOC_EXTENSION}"))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Document names become file names; keep them to a charset that cannot
/// escape the store directory.
fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidDocumentName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn temp_store() -> (tempfile::TempDir, KnowledgeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::load(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn starts_empty_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("kb");
        let store = KnowledgeStore::load(&missing).await.unwrap();
        assert!(missing.is_dir());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn add_persists_and_mirrors() {
        let (dir, store) = temp_store().await;
        store.add("QuestfallDocs", "quests are daily").await.unwrap();

        assert_eq!(store.get("QuestfallDocs").await.as_deref(), Some("quests are daily"));
        let on_disk = std::fs::read_to_string(dir.path().join("QuestfallDocs.txt")).unwrap();
        assert_eq!(on_disk, "quests are daily");
    }

    #[tokio::test]
    async fn add_overwrites_on_name_collision() {
        let (_dir, store) = temp_store().await;
        store.add("doc", "v1").await.unwrap();
        store.add("doc", "v2").await.unwrap();
        assert_eq!(store.get("doc").await.as_deref(), Some("v2"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_deletes_file_and_entry() {
        let (dir, store) = temp_store().await;
        store.add("doc", "text").await.unwrap();

        assert!(store.remove("doc").await.unwrap());
        assert!(store.get("doc").await.is_none());
        assert!(!dir.path().join("doc.txt").exists());
        assert!(!store.remove("doc").await.unwrap());
    }

    #[tokio::test]
    async fn reload_replaces_from_disk() {
        let (dir, store) = temp_store().await;
        store.add("keep", "kept").await.unwrap();

        std::fs::write(dir.path().join("extra.txt"), "added behind our back").unwrap();
        std::fs::write(dir.path().join("ignored.md"), "wrong extension").unwrap();
        std::fs::remove_file(dir.path().join("keep.txt")).unwrap();

        let count = store.reload().await.unwrap();
        assert_eq!(count, 1);
        assert!(store.get("keep").await.is_none());
        assert_eq!(store.get("extra").await.as_deref(), Some("added behind our back"));
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let (_dir, store) = temp_store().await;
        assert!(matches!(
            store.add("../evil", "x").await,
            Err(CoreError::InvalidDocumentName { .. })
        ));
        assert!(matches!(
            store.remove("a/b").await,
            Err(CoreError::InvalidDocumentName { .. })
        ));
    }

    #[tokio::test]
    async fn combined_context_is_name_ordered() {
        let (_dir, store) = temp_store().await;
        assert!(store.combined_context().await.is_none());

        store.add("b_doc", "second").await.unwrap();
        store.add("a_doc", "first").await.unwrap();
        let context = store.combined_context().await.unwrap();
        assert_eq!(context, "# a_doc\nfirst\n\n# b_doc\nsecond");
    }
}
