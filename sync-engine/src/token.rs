//! Durable checkpoints.
//!
//! [`TokenStore`] keeps one watch token per resource so the incremental
//! watcher resumes where it stopped. [`SweepCursorStore`] keeps the resume
//! point of an unfinished full-sync sweep per resource and sub-resource.
//! Both live in the local persistent store.

use serde_json::Value;
use std::sync::Arc;
use sync_types::{Document, ResType, WatchToken};

use crate::store::{Filter, Store, StoreError};
use crate::SyncError;

/// Collection holding watch tokens.
pub const WATCH_TOKEN_COLLECTION: &str = "cc_SyncWatchToken";

/// Collection holding full-sync resume cursors.
pub const SWEEP_CURSOR_COLLECTION: &str = "cc_SyncFullSyncCursor";

fn id_filter(id: &str) -> Filter {
    Filter::eq("_id", id)
}

/// Watch token persistence.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn Store>,
}

impl TokenStore {
    /// Create a token store over the local store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load the token of a resource, creating one starting at `now` if
    /// none exists yet.
    pub async fn load_or_init(&self, res_type: ResType, now: i64) -> Result<WatchToken, SyncError> {
        let filter = id_filter(res_type.as_str());
        if let Some(doc) = self.store.find_one(WATCH_TOKEN_COLLECTION, &filter).await? {
            return serde_json::from_value(Value::Object(doc))
                .map_err(|e| SyncError::Store(StoreError::InvalidDocument(e.to_string())));
        }

        let token = WatchToken::starting_at(now);
        self.save(res_type, &token).await?;
        tracing::info!("Created watch token for {} starting at {}", res_type, now);
        Ok(token)
    }

    /// Persist an advanced token.
    pub async fn advance(&self, res_type: ResType, token: &WatchToken) -> Result<(), SyncError> {
        self.save(res_type, token).await
    }

    /// Drop all cursors and restart from `start_at`.
    pub async fn reset(&self, res_type: ResType, start_at: i64) -> Result<WatchToken, SyncError> {
        let token = WatchToken::starting_at(start_at);
        self.save(res_type, &token).await?;
        Ok(token)
    }

    async fn save(&self, res_type: ResType, token: &WatchToken) -> Result<(), SyncError> {
        let mut doc = match serde_json::to_value(token) {
            Ok(Value::Object(doc)) => doc,
            Ok(_) => Document::new(),
            Err(e) => return Err(StoreError::InvalidDocument(e.to_string()).into()),
        };
        doc.insert("_id".into(), Value::from(res_type.as_str()));
        self.store
            .upsert(WATCH_TOKEN_COLLECTION, &id_filter(res_type.as_str()), doc)
            .await?;
        Ok(())
    }
}

/// Full-sync resume cursor persistence.
///
/// Cursors are stored as JSON so that both entity ids and relation keys fit.
#[derive(Clone)]
pub struct SweepCursorStore {
    store: Arc<dyn Store>,
}

impl SweepCursorStore {
    /// Create a cursor store over the local store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn cursor_id(res_type: ResType, sub_res: &str) -> String {
        format!("{}:{}", res_type, sub_res)
    }

    /// The saved resume point, if any.
    pub async fn get(&self, res_type: ResType, sub_res: &str) -> Result<Option<Value>, SyncError> {
        let filter = id_filter(&Self::cursor_id(res_type, sub_res));
        let doc = self.store.find_one(SWEEP_CURSOR_COLLECTION, &filter).await?;
        Ok(doc.and_then(|mut d| d.remove("next")))
    }

    /// Save the resume point.
    pub async fn set(&self, res_type: ResType, sub_res: &str, next: Value) -> Result<(), SyncError> {
        let id = Self::cursor_id(res_type, sub_res);
        let mut doc = Document::new();
        doc.insert("_id".into(), Value::from(id.clone()));
        doc.insert("next".into(), next);
        self.store
            .upsert(SWEEP_CURSOR_COLLECTION, &id_filter(&id), doc)
            .await?;
        Ok(())
    }

    /// Forget the resume point once a sweep completed.
    pub async fn clear(&self, res_type: ResType, sub_res: &str) -> Result<(), SyncError> {
        let filter = id_filter(&Self::cursor_id(res_type, sub_res));
        self.store.delete(SWEEP_CURSOR_COLLECTION, &filter).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn first_load_creates_token() {
        let store = MemoryStore::new();
        let tokens = TokenStore::new(Arc::new(store.clone()));

        let token = tokens.load_or_init(ResType::Host, 1000).await.unwrap();
        assert_eq!(token.start_at, 1000);
        assert!(token.cursors.is_empty());
        assert_eq!(store.documents(WATCH_TOKEN_COLLECTION).len(), 1);

        let again = tokens.load_or_init(ResType::Host, 2000).await.unwrap();
        assert_eq!(again.start_at, 1000);
    }

    #[tokio::test]
    async fn advance_persists_cursor() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        let mut token = tokens.load_or_init(ResType::Biz, 10).await.unwrap();
        token.cursors.insert("biz".into(), "42".into());
        tokens.advance(ResType::Biz, &token).await.unwrap();

        let loaded = tokens.load_or_init(ResType::Biz, 99).await.unwrap();
        assert_eq!(loaded.cursor("biz"), Some("42"));
    }

    #[tokio::test]
    async fn reset_clears_cursors() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        let mut token = tokens.load_or_init(ResType::Set, 10).await.unwrap();
        token.cursors.insert("set".into(), "7".into());
        tokens.advance(ResType::Set, &token).await.unwrap();

        let reset = tokens.reset(ResType::Set, 500).await.unwrap();
        assert_eq!(reset.cursor("set"), None);
        let loaded = tokens.load_or_init(ResType::Set, 0).await.unwrap();
        assert_eq!(loaded.start_at, 500);
        assert!(loaded.cursors.is_empty());
    }

    #[tokio::test]
    async fn tokens_are_per_resource() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        tokens.load_or_init(ResType::Host, 1).await.unwrap();
        let biz = tokens.load_or_init(ResType::Biz, 2).await.unwrap();
        assert_eq!(biz.start_at, 2);
    }

    #[tokio::test]
    async fn sweep_cursor_roundtrip() {
        let cursors = SweepCursorStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(cursors.get(ResType::HostRelation, "").await.unwrap(), None);

        let next = json!({"first": 4, "second": 9});
        cursors.set(ResType::HostRelation, "", next.clone()).await.unwrap();
        cursors.set(ResType::ObjectInstance, "bk_switch", json!(11)).await.unwrap();
        assert_eq!(cursors.get(ResType::HostRelation, "").await.unwrap(), Some(next));
        assert_eq!(cursors.get(ResType::ObjectInstance, "bk_switch").await.unwrap(), Some(json!(11)));

        cursors.clear(ResType::HostRelation, "").await.unwrap();
        assert_eq!(cursors.get(ResType::HostRelation, "").await.unwrap(), None);
    }
}
