//! Scoped document storage.
//!
//! The analysis only needs the two traits below. [`MemoryStore`] is the
//! in-process implementation used by the binaries and tests.

use crate::analysis::{self, Analysis};
use crate::config::{FieldSpecs, IndexConfig};
use crate::{DocId, Document, Fields};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub trait DocumentSource {
    /// All documents of `scope`, in insertion order.
    fn enumerate(&self, scope: &str) -> Vec<Document>;

    fn fetch(&self, scope: &str, id: &str) -> Option<Document>;

    /// Documents found among `ids`, in the order requested. Missing ids are skipped.
    fn fetch_many(&self, scope: &str, ids: &[DocId]) -> Vec<Document> {
        ids.iter().filter_map(|id| self.fetch(scope, id)).collect()
    }
}

pub trait IndexConfigSource {
    fn index_config(&self, scope: &str) -> Option<IndexConfig>;
}

#[derive(Debug, Default)]
struct ScopeData {
    docs: Vec<Document>,
    positions: HashMap<DocId, usize>,
    config: Option<IndexConfig>,
}

impl ScopeData {
    fn upsert(&mut self, doc: Document) {
        match self.positions.get(&doc.id).copied() {
            Some(pos) => self.docs[pos] = doc,
            None => {
                self.positions.insert(doc.id.clone(), self.docs.len());
                self.docs.push(doc);
            }
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.positions.remove(id) else { return false };
        self.docs.remove(pos);
        for (i, doc) in self.docs.iter().enumerate().skip(pos) {
            self.positions.insert(doc.id.clone(), i);
        }
        true
    }
}

/// Everything a [`MemoryStore`] holds, in a serializable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub configs: BTreeMap<String, IndexConfig>,
    pub documents: BTreeMap<String, Vec<Document>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    scopes: RwLock<HashMap<String, ScopeData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document. A replaced document keeps its position.
    pub fn insert(&self, scope: &str, id: impl Into<DocId>, fields: Fields) {
        let mut scopes = self.scopes.write();
        scopes
            .entry(scope.to_string())
            .or_default()
            .upsert(Document::new(id, fields));
    }

    pub fn get(&self, scope: &str, id: &str) -> Option<Document> {
        self.fetch(scope, id)
    }

    pub fn get_many(&self, scope: &str, ids: &[DocId]) -> Vec<Document> {
        self.fetch_many(scope, ids)
    }

    pub fn delete(&self, scope: &str, id: &str) -> bool {
        let mut scopes = self.scopes.write();
        scopes.get_mut(scope).map(|s| s.remove(id)).unwrap_or(false)
    }

    pub fn len(&self, scope: &str) -> usize {
        self.scopes.read().get(scope).map(|s| s.docs.len()).unwrap_or(0)
    }

    /// Merge `specs` into the scope's text index configuration.
    pub fn text_index(&self, scope: &str, specs: &FieldSpecs) {
        let mut scopes = self.scopes.write();
        let data = scopes.entry(scope.to_string()).or_default();
        let merged = match &data.config {
            Some(current) => current.merge(specs),
            None => IndexConfig::from_specs(specs),
        };
        tracing::debug!(scope, fields = merged.len(), "text index configured");
        data.config = Some(merged);
    }

    pub fn dump_indices(&self, scope: &str) -> Option<IndexConfig> {
        self.index_config(scope)
    }

    pub fn dump_all_indices(&self) -> BTreeMap<String, IndexConfig> {
        self.scopes
            .read()
            .iter()
            .filter_map(|(scope, data)| Some((scope.clone(), data.config.clone()?)))
            .collect()
    }

    /// Build a fresh analysis for `scope`; `None` when it has no text index.
    pub fn text_analysis(&self, scope: &str) -> Option<Analysis> {
        analysis::build(self, scope)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let scopes = self.scopes.read();
        let mut snap = StoreSnapshot::default();
        for (scope, data) in scopes.iter() {
            if let Some(config) = &data.config {
                snap.configs.insert(scope.clone(), config.clone());
            }
            if !data.docs.is_empty() {
                snap.documents.insert(scope.clone(), data.docs.clone());
            }
        }
        snap
    }

    pub fn from_snapshot(snap: StoreSnapshot) -> Self {
        let mut scopes: HashMap<String, ScopeData> = HashMap::new();
        for (scope, config) in snap.configs {
            scopes.entry(scope).or_default().config = Some(config);
        }
        for (scope, docs) in snap.documents {
            let data = scopes.entry(scope).or_default();
            for doc in docs {
                data.upsert(doc);
            }
        }
        Self { scopes: RwLock::new(scopes) }
    }
}

impl DocumentSource for MemoryStore {
    fn enumerate(&self, scope: &str) -> Vec<Document> {
        self.scopes.read().get(scope).map(|s| s.docs.clone()).unwrap_or_default()
    }

    fn fetch(&self, scope: &str, id: &str) -> Option<Document> {
        let scopes = self.scopes.read();
        let data = scopes.get(scope)?;
        data.positions.get(id).map(|&pos| data.docs[pos].clone())
    }
}

impl IndexConfigSource for MemoryStore {
    fn index_config(&self, scope: &str) -> Option<IndexConfig> {
        self.scopes.read().get(scope).and_then(|s| s.config.clone())
    }
}
