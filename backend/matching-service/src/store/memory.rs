use super::{InterestUpdate, PostingStore, WriteBatch};
use crate::error::Result;
use crate::posting::{self, Aggregate, PostingList, WeightedKey};
use crate::utils::stable_sum;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-process posting store.
///
/// One `RwLock` guards every list, so each trait call (a whole batch, a whole
/// union) is atomic with respect to every other call. Expiry is not tracked;
/// lists live until deleted.
#[derive(Clone, Default)]
pub struct MemoryPostingStore {
    lists: Arc<RwLock<HashMap<String, PostingList>>>,
}

impl MemoryPostingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-empty key currently stored, sorted
    pub async fn keys(&self) -> Vec<String> {
        let lists = self.lists.read().await;
        let mut keys: Vec<String> = lists
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn store_result(lists: &mut HashMap<String, PostingList>, dest: &str, result: PostingList) -> usize {
        let size = result.len();
        if result.is_empty() {
            lists.remove(dest);
        } else {
            lists.insert(dest.to_string(), result);
        }
        size
    }
}

// Missing keys read as this list
fn empty() -> &'static PostingList {
    static EMPTY: std::sync::OnceLock<PostingList> = std::sync::OnceLock::new();
    EMPTY.get_or_init(PostingList::new)
}

fn resolve<'a>(
    lists: &'a HashMap<String, PostingList>,
    sources: &[WeightedKey],
) -> Vec<(&'a PostingList, f64)> {
    sources
        .iter()
        .map(|source| (lists.get(&source.key).unwrap_or_else(|| empty()), source.weight))
        .collect()
}

#[async_trait]
impl PostingStore for MemoryPostingStore {
    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let lists = self.lists.read().await;
        Ok(lists.get(key).and_then(|list| list.get(member)).copied())
    }

    async fn entries(&self, key: &str) -> Result<PostingList> {
        let lists = self.lists.read().await;
        Ok(lists.get(key).cloned().unwrap_or_default())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut lists = self.lists.write().await;

        for op in batch.ops() {
            lists
                .entry(op.key.clone())
                .or_default()
                .insert(op.member.clone(), op.score);
        }

        debug!(ops = batch.ops().len(), "Batch applied");
        Ok(())
    }

    async fn accumulate_interest(&self, update: &InterestUpdate) -> Result<PostingList> {
        let mut lists = self.lists.write().await;

        let raw = {
            let raw = lists.entry(update.raw_key.clone()).or_default();
            for attribute in &update.attributes {
                *raw.entry(attribute.clone()).or_insert(0.0) += update.delta;
            }
            raw.clone()
        };

        let total = stable_sum(raw.values().copied());
        if total != 0.0 {
            for (attribute, weight) in raw.iter().filter(|(_, weight)| **weight != 0.0) {
                let share = weight / total;
                lists
                    .entry(update.normalized_key.clone())
                    .or_default()
                    .insert(attribute.clone(), share);
                lists
                    .entry(update.interested_key(attribute))
                    .or_default()
                    .insert(update.actor.clone(), share);
            }
        }

        Ok(raw)
    }

    async fn union_store(
        &self,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize> {
        let mut lists = self.lists.write().await;
        let result = posting::weighted_union(&resolve(&lists, sources), aggregate);
        Ok(Self::store_result(&mut lists, dest, result))
    }

    async fn inter_store(
        &self,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize> {
        let mut lists = self.lists.write().await;
        let result = posting::weighted_intersection(&resolve(&lists, sources), aggregate);
        Ok(Self::store_result(&mut lists, dest, result))
    }

    async fn range_desc(&self, key: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let lists = self.lists.read().await;
        Ok(lists
            .get(key)
            .map(|list| posting::top_desc(list, limit))
            .unwrap_or_default())
    }

    async fn expire(&self, _keys: &[String], _ttl_secs: u64) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let mut lists = self.lists.write().await;
        for key in keys {
            lists.remove(key);
        }
        Ok(())
    }
}
