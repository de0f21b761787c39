//! Abstract vector index contract, plus an in-process implementation used
//! when no external vector engine is configured and in tests.
//!
//! Grounded on the same shape as a content-addressed object store: a small
//! trait with `Send + Sync` bound, one concrete in-memory implementation
//! behind a lock, real backends implementing the same trait out of process.

use crate::error::CoreError;
use crate::metadata::MetadataValue;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Gte(String, f64),
    Lte(String, f64),
    Lt(String, f64),
    Eq(String, MetadataValue),
    And(Vec<WhereClause>),
}

impl WhereClause {
    pub fn matches(&self, metadata: &HashMap<String, MetadataValue>) -> bool {
        match self {
            WhereClause::Gte(key, bound) => metadata.get(key).and_then(MetadataValue::as_f64).is_some_and(|v| v >= *bound),
            WhereClause::Lte(key, bound) => metadata.get(key).and_then(MetadataValue::as_f64).is_some_and(|v| v <= *bound),
            WhereClause::Lt(key, bound) => metadata.get(key).and_then(MetadataValue::as_f64).is_some_and(|v| v < *bound),
            WhereClause::Eq(key, expected) => metadata.get(key) == Some(expected),
            WhereClause::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub distance: f64,
    pub metadata: HashMap<String, MetadataValue>,
    pub document: Option<String>,
}

/// Upsert/query/count/list-ids surface every concrete vector backend must
/// provide. Metadata is a flat scalar map — see [`crate::metadata`].
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(
        &self,
        ids: Vec<String>,
        texts: Vec<String>,
        metadatas: Vec<HashMap<String, MetadataValue>>,
    ) -> Result<(), CoreError>;

    async fn query(
        &self,
        text: &str,
        k: usize,
        where_clause: Option<WhereClause>,
    ) -> Result<Vec<VectorHit>, CoreError>;

    async fn count(&self) -> Result<usize, CoreError>;

    async fn get_ids(&self) -> Result<Vec<String>, CoreError>;
}

struct Entry {
    text: String,
    tokens: HashSet<String>,
    metadata: HashMap<String, MetadataValue>,
}

/// In-process vector index for tests and for running the server with no
/// external vector engine configured. Scoring is exact token-overlap, not
/// an approximate nearest-neighbor index — good enough to exercise the
/// ranking and filter contracts, not production search quality.
#[derive(Default)]
pub struct MemoryVectorIndex {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokenize(text: &str) -> HashSet<String> {
        text.split_whitespace().map(|t| t.to_lowercase()).collect()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(
        &self,
        ids: Vec<String>,
        texts: Vec<String>,
        metadatas: Vec<HashMap<String, MetadataValue>>,
    ) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap();
        for ((id, text), metadata) in ids.into_iter().zip(texts).zip(metadatas) {
            let tokens = Self::tokenize(&text);
            entries.insert(id, Entry { text, tokens, metadata });
        }
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        k: usize,
        where_clause: Option<WhereClause>,
    ) -> Result<Vec<VectorHit>, CoreError> {
        let query_tokens = Self::tokenize(text);
        let entries = self.entries.read().unwrap();
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .filter(|(_, entry)| where_clause.as_ref().is_none_or(|w| w.matches(&entry.metadata)))
            .map(|(id, entry)| {
                let overlap = query_tokens.intersection(&entry.tokens).count();
                let score = if query_tokens.is_empty() {
                    0.0
                } else {
                    overlap as f64 / query_tokens.len() as f64
                };
                VectorHit {
                    id: id.clone(),
                    distance: (1.0 - score).max(0.0),
                    metadata: entry.metadata.clone(),
                    document: Some(entry.text.clone()),
                }
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.entries.read().unwrap().len())
    }

    async fn get_ids(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.entries.read().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, MetadataValue)]) -> HashMap<String, MetadataValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn upsert_and_query_ranks_by_overlap() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                vec!["a".into(), "b".into()],
                vec!["invoice payment receipt".into(), "unrelated screenshot text".into()],
                vec![meta(&[]), meta(&[])],
            )
            .await
            .unwrap();
        let hits = index.query("invoice payment", 5, None).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn where_clause_filters_by_timestamp_range() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                vec!["old".into(), "new".into()],
                vec!["text".into(), "text".into()],
                vec![
                    meta(&[("timestamp".into(), MetadataValue::Number(1.0))]),
                    meta(&[("timestamp".into(), MetadataValue::Number(100.0))]),
                ],
            )
            .await
            .unwrap();
        let hits = index
            .query("text", 10, Some(WhereClause::Gte("timestamp".into(), 50.0)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "new");
    }

    #[tokio::test]
    async fn count_and_get_ids_reflect_upserts() {
        let index = MemoryVectorIndex::new();
        assert_eq!(index.count().await.unwrap(), 0);
        index
            .upsert(vec!["a".into()], vec!["x".into()], vec![meta(&[])])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.get_ids().await.unwrap(), vec!["a".to_string()]);
    }
}
