use crate::document::{DocumentError, LayoutDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Absolute form of `path` without touching the filesystem.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Layouts of files the user has switched away from, keyed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    documents: HashMap<PathBuf, LayoutDocument>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, document: LayoutDocument) {
        self.documents.insert(absolute_path(&document.file), document);
    }

    pub fn get(&self, file: &Path) -> Option<&LayoutDocument> {
        self.documents.get(&absolute_path(file))
    }

    pub fn forget(&mut self, file: &Path) -> Option<LayoutDocument> {
        self.documents.remove(&absolute_path(file))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Persist every cached layout as one JSON array.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let mut documents: Vec<&LayoutDocument> = self.documents.values().collect();
        documents.sort_by(|a, b| a.file.cmp(&b.file));
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(&documents)?)?;
        Ok(())
    }

    /// Read a cache written by [`SessionCache::save`]. A missing file is an
    /// empty cache.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let documents: Vec<LayoutDocument> = serde_json::from_str(&text)?;
        let mut cache = Self::new();
        for document in documents {
            cache.store(document);
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    fn document(file: &str) -> LayoutDocument {
        let mut scene = Scene::default();
        scene.file = Some(PathBuf::from(file));
        LayoutDocument::capture(&scene)
    }

    #[test]
    fn test_store_get_forget() {
        let mut cache = SessionCache::new();
        cache.store(document("/tmp/a.rs"));
        cache.store(document("/tmp/a.rs"));
        cache.store(document("/tmp/b.rs"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Path::new("/tmp/a.rs")).is_some());
        assert!(cache.forget(Path::new("/tmp/a.rs")).is_some());
        assert!(cache.get(Path::new("/tmp/a.rs")).is_none());
    }

    #[test]
    fn test_persist_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        assert!(SessionCache::load(&path).unwrap().is_empty());

        let mut cache = SessionCache::new();
        cache.store(document("/tmp/a.rs"));
        cache.store(document("/tmp/b.rs"));
        cache.save(&path).unwrap();

        let loaded = SessionCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.get(Path::new("/tmp/b.rs")),
            cache.get(Path::new("/tmp/b.rs"))
        );
    }
}
