use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    knowledge::store::{Fingerprint, KnowledgeStore},
    Result,
};

/// Immutable snapshot of the knowledge text and the fingerprint it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeDocument {
    pub text: String,
    pub fingerprint: Fingerprint,
}

/// Whole-document cache over a [`KnowledgeStore`].
///
/// Every access re-checks the store fingerprint; the text is only reloaded when
/// it changed. Check and reload run under one lock so concurrent callers never
/// reload the same content twice.
pub struct KnowledgeCache {
    store: Arc<dyn KnowledgeStore>,
    current: Mutex<Option<Arc<KnowledgeDocument>>>,
}

impl KnowledgeCache {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    pub async fn current(&self) -> Result<Arc<KnowledgeDocument>> {
        let mut guard = self.current.lock().await;
        let fingerprint = self.store.current_fingerprint().await?;

        if let Some(doc) = guard.as_ref() {
            if doc.fingerprint == fingerprint {
                tracing::debug!("using cached knowledge base");
                return Ok(doc.clone());
            }
        }

        let text = self.store.load().await?;
        tracing::info!(bytes = text.len(), "knowledge base loaded");
        let doc = Arc::new(KnowledgeDocument { text, fingerprint });
        *guard = Some(doc.clone());
        Ok(doc)
    }
}
