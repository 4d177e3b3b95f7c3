// ============================================
// Posting Store (storage collaborator seam)
// ============================================
//
// Everything persistent is a posting list (sorted set) addressed by key.
// The indices and the recommendation pipeline only talk to this trait:
//
// - score / entries            point and full reads
// - apply(WriteBatch)          atomic batch of score writes
// - accumulate_interest        atomic increment + normalize + publish
// - union_store / inter_store  weighted set algebra into a destination key
// - range_desc                 top-N extraction
// - expire / delete            scratch housekeeping
//
// Implementations:
// - MemoryPostingStore  in-process, one RwLock over every list
// - RedisPostingStore   sorted sets, MULTI/EXEC for batches, Lua for interest

mod memory;
mod redis_store;

pub use memory::MemoryPostingStore;
pub use redis_store::RedisPostingStore;

use crate::error::Result;
use crate::posting::{Aggregate, PostingList, WeightedKey};
use async_trait::async_trait;

/// `list[member] = score` inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub key: String,
    pub member: String,
    pub score: f64,
}

/// Score writes that commit as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.ops.push(WriteOp {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// One RecordInterest step, executed by the store as a single atomic unit:
///
/// 1. `raw[a] += delta` for every attribute
/// 2. `total = Σ raw[*]`
/// 3. if `total != 0`, for every `a` with `raw[a] != 0`:
///    `normalized[a] = raw[a] / total` and
///    `{interested_head}{a}{interested_tail}[actor] = raw[a] / total`
#[derive(Debug, Clone, PartialEq)]
pub struct InterestUpdate {
    pub actor: String,
    pub delta: f64,
    pub attributes: Vec<String>,
    pub raw_key: String,
    pub normalized_key: String,
    pub interested_head: String,
    pub interested_tail: String,
}

impl InterestUpdate {
    pub fn interested_key(&self, attribute: &str) -> String {
        format!("{}{}{}", self.interested_head, attribute, self.interested_tail)
    }
}

/// Sorted-set storage the matching indices are built on.
///
/// Missing keys behave as empty lists everywhere. Failures surface as
/// [`crate::MatchError::StorageUnavailable`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Score of one member, `None` when absent
    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Whole list
    async fn entries(&self, key: &str) -> Result<PostingList>;

    /// Commit every op atomically.
    async fn apply(&self, batch: WriteBatch) -> Result<()>;

    /// Run one [`InterestUpdate`] atomically; returns the raw list after the
    /// increments. Either every write of the step lands or none does, and no
    /// other writer to the same keys can interleave with it.
    async fn accumulate_interest(&self, update: &InterestUpdate) -> Result<PostingList>;

    /// Replace `dest` with the weighted union of `sources`; returns its size.
    async fn union_store(
        &self,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize>;

    /// Replace `dest` with the weighted intersection of `sources`; returns its size.
    async fn inter_store(
        &self,
        dest: &str,
        sources: &[WeightedKey],
        aggregate: Aggregate,
    ) -> Result<usize>;

    /// Up to `limit` entries by score descending
    async fn range_desc(&self, key: &str, limit: usize) -> Result<Vec<(String, f64)>>;

    /// Best-effort expiry for lists that must not outlive a request
    async fn expire(&self, keys: &[String], ttl_secs: u64) -> Result<()>;

    async fn delete(&self, keys: &[String]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_builder() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.set("k1", "m1", 1.0).set("k2", "m2", 0.5);

        assert_eq!(batch.ops().len(), 2);
        assert_eq!(
            batch.ops()[1],
            WriteOp {
                key: "k2".into(),
                member: "m2".into(),
                score: 0.5
            }
        );
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_interest_update_builds_interested_keys() {
        let update = InterestUpdate {
            actor: "5".into(),
            delta: 1.0,
            attributes: vec!["gender:f".into()],
            raw_key: "raw".into(),
            normalized_key: "norm".into(),
            interested_head: "v1:match:attr:".into(),
            interested_tail: ":interested".into(),
        };

        assert_eq!(
            update.interested_key("gender:f"),
            "v1:match:attr:gender:f:interested"
        );
    }
}
