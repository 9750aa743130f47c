//! In-process document store
//!
//! Backs the tests and `publish --dry-run`. Mirrors the remote store's
//! semantics closely enough for the publisher: conflicts on duplicate ids,
//! top-level `set`/`unset` patches, image assets as opaque ids.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Category, ContentStore, PatchOperations, PostFilter, PostSummary, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Value>>,
    assets: Mutex<Vec<(String, usize)>>,
    fail_uploads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `upload_image` fail
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.documents.lock().ok()?.get(id).cloned()
    }

    pub fn documents_of_type(&self, doc_type: &str) -> Vec<Value> {
        match self.documents.lock() {
            Ok(docs) => docs
                .values()
                .filter(|d| d.get("_type").and_then(|t| t.as_str()) == Some(doc_type))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn asset_count(&self) -> usize {
        self.assets.lock().map(|a| a.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::InvalidResponse("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_category(&self, title: &str) -> Result<Option<Category>, StoreError> {
        let docs = self.lock()?;
        Ok(docs
            .values()
            .filter(|d| d.get("_type").and_then(|t| t.as_str()) == Some("category"))
            .find(|d| d.get("title").and_then(|t| t.as_str()) == Some(title))
            .and_then(|d| serde_json::from_value(d.clone()).ok()))
    }

    async fn create(&self, mut document: Value) -> Result<String, StoreError> {
        let mut docs = self.lock()?;
        let id = match document.get("_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        if docs.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        if let Some(obj) = document.as_object_mut() {
            obj.insert("_id".to_string(), Value::String(id.clone()));
        }
        docs.insert(id.clone(), document);
        Ok(id)
    }

    async fn patch(&self, id: &str, operations: PatchOperations) -> Result<(), StoreError> {
        let mut docs = self.lock()?;
        let obj = docs
            .get_mut(id)
            .and_then(|d| d.as_object_mut())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(Value::Object(fields)) = operations.set {
            for (key, value) in fields {
                obj.insert(key, value);
            }
        }
        for key in operations.unset.unwrap_or_default() {
            obj.remove(&key);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.remove(id);
        Ok(())
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _content_type: &str,
    ) -> Result<String, StoreError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 500,
                message: format!("upload of {} rejected", filename),
            });
        }
        let id = format!("image-{}", uuid::Uuid::new_v4().simple());
        if let Ok(mut assets) = self.assets.lock() {
            assets.push((id.clone(), bytes.len()));
        }
        Ok(id)
    }

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<PostSummary>, StoreError> {
        let docs = self.lock()?;
        let mut posts: Vec<PostSummary> = docs
            .values()
            .filter(|d| d.get("_type").and_then(|t| t.as_str()) == Some("post"))
            .filter(|d| {
                let deleted = d.get("deleted").and_then(|v| v.as_bool()).unwrap_or(false);
                match filter {
                    PostFilter::Active => !deleted,
                    PostFilter::Deleted => deleted,
                }
            })
            .filter_map(PostSummary::from_document)
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(posts)
    }
}
