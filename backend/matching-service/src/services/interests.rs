// ============================================
// Interest Index (興趣權重索引)
// ============================================
//
// Accumulates raw interest weights per member and republishes them
// normalized so that a member's weights always sum to 1.0:
//
//   normalized[B] = raw[B] / Σ raw[*]
//
// Keys:
// - member:{actor}:interest:raw   attribute → accumulated raw weight
// - member:{actor}:interest       attribute → normalized weight
// - attr:{attribute}:interested   actor → normalized weight
//
// A RecordInterest call is a read-modify-write over the actor's whole raw
// map. The store runs increment, total and publication as one atomic step,
// so concurrent calls for one actor (from any process sharing the store)
// never publish a stale profile, and a failed call writes nothing.

use super::validate_ingest;
use crate::error::{MatchError, Result};
use crate::keys::IndexKey;
use crate::posting::PostingList;
use crate::store::{InterestUpdate, PostingStore};
use crate::utils::stable_sum;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct InterestIndex<S> {
    store: Arc<S>,
    keys: IndexKey,
}

impl<S: PostingStore> InterestIndex<S> {
    pub fn new(store: Arc<S>, keys: IndexKey) -> Self {
        Self { store, keys }
    }

    /// Add `delta` to the actor's raw interest in each attribute, then
    /// republish the actor's full normalized profile.
    ///
    /// `delta` must be finite and non-negative. A zero raw total leaves the
    /// published profile untouched.
    pub async fn record_interest<A: AsRef<str>>(
        &self,
        actor_id: &str,
        delta: f64,
        attributes: &[A],
    ) -> Result<()> {
        validate_ingest("actor_id", actor_id, attributes)?;
        if !delta.is_finite() || delta < 0.0 {
            return Err(MatchError::InvalidArgument(format!(
                "delta must be a finite non-negative number, got {}",
                delta
            )));
        }

        let (interested_head, interested_tail) = self.keys.interested_affixes();
        let update = InterestUpdate {
            actor: actor_id.to_string(),
            delta,
            attributes: attributes.iter().map(|a| a.as_ref().to_string()).collect(),
            raw_key: self.keys.raw_interest(actor_id),
            normalized_key: self.keys.normalized_interest(actor_id),
            interested_head,
            interested_tail,
        };

        let raw = self.store.accumulate_interest(&update).await?;
        let total = stable_sum(raw.values().copied());

        if total == 0.0 {
            debug!(
                actor_id = actor_id,
                "Raw interest total is zero, normalization skipped"
            );
        } else {
            debug!(
                actor_id = actor_id,
                delta = delta,
                attributes = attributes.len(),
                tracked = raw.len(),
                total = total,
                "Interest recorded and normalized"
            );
        }

        Ok(())
    }

    /// Published normalized profile of an actor
    pub async fn normalized_interest(&self, actor_id: &str) -> Result<BTreeMap<String, f64>> {
        let entries = self
            .store
            .entries(&self.keys.normalized_interest(actor_id))
            .await?;
        Ok(entries.into_iter().collect())
    }

    /// Accumulated raw weights of an actor
    pub async fn raw_interest(&self, actor_id: &str) -> Result<BTreeMap<String, f64>> {
        let entries = self.store.entries(&self.keys.raw_interest(actor_id)).await?;
        Ok(entries.into_iter().collect())
    }

    /// Interest posting list of one attribute: actor → normalized weight
    pub async fn interested_in(&self, attribute: &str) -> Result<PostingList> {
        self.store.entries(&self.keys.interested(attribute)).await
    }
}
