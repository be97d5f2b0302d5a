use std::collections::BTreeMap;
use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::Document;
use crate::DocumentError;
use crate::DocumentStore;

/// In-memory [`DocumentStore`] for tests, with per-document read
/// failure injection.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<(String, String), Document>>,
    failing: RwLock<HashSet<(String, String)>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(
        &self,
        collection: &str,
        id: &str,
        doc: Document,
    ) {
        self.docs
            .write()
            .insert((collection.to_string(), id.to_string()), doc);
    }

    pub fn delete(
        &self,
        collection: &str,
        id: &str,
    ) {
        self.docs
            .write()
            .remove(&(collection.to_string(), id.to_string()));
    }

    /// Make every subsequent read of this document fail with a backend
    /// error.
    pub fn fail_reads_for(
        &self,
        collection: &str,
        id: &str,
    ) {
        self.failing
            .write()
            .insert((collection.to_string(), id.to_string()));
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DocumentError> {
        let key = (collection.to_string(), id.to_string());
        if self.failing.read().contains(&key) {
            return Err(DocumentError::Backend(format!(
                "injected read failure for {collection}/{id}"
            )));
        }
        Ok(self.docs.read().get(&key).cloned())
    }

    async fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Document)>, DocumentError> {
        Ok(self
            .docs
            .read()
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), doc)| (id.clone(), doc.clone()))
            .collect())
    }
}
