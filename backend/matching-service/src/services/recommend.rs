// ============================================
// Recommendation Engine (互相匹配推薦)
// ============================================
//
// Six-stage reciprocal matching over the attribute and interest indices.
// Every union/intersection uses SUM with explicit weights.
//
//   1. pool      = ∪ presence[a]            a ∈ or_filters      (w = 1)
//   2. filter    = pool ∩ presence[a] ...   a ∈ and_filters     (w = 0)
//   3. received  = ∪ interested[a]          a ∈ my_attributes   (w = 1)
//   4. given     = ∪ presence[a]            a ∈ my_interests    (w = my_interests[a])
//   5. combined  = filter ∩ received ∩ given                    (w = 1)
//   6. score     = harmonic_mean(given[m], combined[m] - given[m]) > threshold
//
// Stage outputs live in a ScratchSpace keyed by a fresh request id, so
// concurrent queries never see each other's intermediate lists. Scratch
// lists are deleted when the query ends, successfully or not.

use crate::config::MatchingConfig;
use crate::error::Result;
use crate::keys::IndexKey;
use crate::models::{Match, MatchQuery, PipelineStats};
use crate::posting::{score_ordering, Aggregate, WeightedKey};
use crate::store::PostingStore;
use crate::utils::reciprocal_score;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Private scratch lists of one recommend call
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    request_id: Uuid,
    pool: String,
    filter: String,
    received: String,
    given: String,
    combined: String,
}

impl ScratchSpace {
    pub fn new(keys: &IndexKey) -> Self {
        let request_id = Uuid::new_v4();
        Self {
            request_id,
            pool: keys.scratch(request_id, "pool"),
            filter: keys.scratch(request_id, "filter"),
            received: keys.scratch(request_id, "received"),
            given: keys.scratch(request_id, "given"),
            combined: keys.scratch(request_id, "combined"),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn keys(&self) -> Vec<String> {
        vec![
            self.pool.clone(),
            self.filter.clone(),
            self.received.clone(),
            self.given.clone(),
            self.combined.clone(),
        ]
    }
}

pub struct RecommendationEngine<S> {
    store: Arc<S>,
    keys: IndexKey,
    config: MatchingConfig,
}

impl<S: PostingStore> RecommendationEngine<S> {
    pub fn new(store: Arc<S>, keys: IndexKey, config: MatchingConfig) -> Self {
        Self {
            store,
            keys,
            config,
        }
    }

    /// Top `query.cardinality` reciprocal matches, best first.
    ///
    /// Ties are broken by member id ascending. An empty pool, or nobody
    /// surviving the filters, is an empty result rather than an error.
    pub async fn recommend(&self, query: &MatchQuery) -> Result<Vec<Match>> {
        query.validate()?;

        if query.or_filters.is_empty() || query.cardinality == 0 {
            return Ok(Vec::new());
        }

        let scratch = ScratchSpace::new(&self.keys);
        let outcome = self.run_pipeline(query, &scratch).await;
        self.release(&scratch).await;

        outcome
    }

    async fn run_pipeline(&self, query: &MatchQuery, scratch: &ScratchSpace) -> Result<Vec<Match>> {
        let mut stats = PipelineStats::default();

        // 1. candidate pool
        let pool_sources: Vec<WeightedKey> = distinct(&query.or_filters)
            .map(|a| WeightedKey::unit(self.keys.presence(a)))
            .collect();
        stats.pool = self
            .store
            .union_store(&scratch.pool, &pool_sources, Aggregate::Sum)
            .await?;
        if stats.pool == 0 {
            return Ok(self.finish(scratch, stats, Vec::new()));
        }

        // 2. hard filters, zero weights so only membership survives
        let mut filter_sources = vec![WeightedKey::new(scratch.pool.as_str(), 0.0)];
        filter_sources.extend(
            distinct(&query.and_filters).map(|a| WeightedKey::new(self.keys.presence(a), 0.0)),
        );
        stats.filtered = self
            .store
            .inter_store(&scratch.filter, &filter_sources, Aggregate::Sum)
            .await?;
        if stats.filtered == 0 {
            return Ok(self.finish(scratch, stats, Vec::new()));
        }

        // 3. their interest in me
        let received_sources: Vec<WeightedKey> = distinct(&query.my_attributes)
            .map(|a| WeightedKey::unit(self.keys.interested(a)))
            .collect();
        stats.received = self
            .store
            .union_store(&scratch.received, &received_sources, Aggregate::Sum)
            .await?;

        // 4. my interest in them
        let given_sources: Vec<WeightedKey> = query
            .my_interests
            .iter()
            .map(|(a, weight)| WeightedKey::new(self.keys.presence(a), *weight))
            .collect();
        stats.given = self
            .store
            .union_store(&scratch.given, &given_sources, Aggregate::Sum)
            .await?;

        if stats.received == 0 || stats.given == 0 {
            return Ok(self.finish(scratch, stats, Vec::new()));
        }

        // 5. filter + received + given
        let combined_sources = [
            WeightedKey::unit(scratch.filter.as_str()),
            WeightedKey::unit(scratch.received.as_str()),
            WeightedKey::unit(scratch.given.as_str()),
        ];
        stats.combined = self
            .store
            .inter_store(&scratch.combined, &combined_sources, Aggregate::Sum)
            .await?;

        if let Err(err) = self
            .store
            .expire(&scratch.keys(), self.config.scratch_ttl_secs)
            .await
        {
            warn!(request_id = %scratch.request_id, error = %err, "Failed to set scratch TTL");
        }

        if stats.combined == 0 {
            return Ok(self.finish(scratch, stats, Vec::new()));
        }

        // 6. reciprocal score per survivor
        let (combined, given_scores) = tokio::try_join!(
            self.store.range_desc(&scratch.combined, usize::MAX),
            self.store.entries(&scratch.given),
        )?;

        let mut scored: Vec<(String, f64)> = combined
            .into_iter()
            .filter_map(|(member, combined_score)| {
                let given = given_scores.get(&member).copied().unwrap_or(0.0);
                let received = combined_score - given;
                reciprocal_score(given, received).map(|score| (member, score))
            })
            .filter(|(_, score)| *score > self.config.score_threshold)
            .collect();
        stats.scored = scored.len();

        // 7. rank and cut
        scored.sort_by(score_ordering);
        scored.truncate(query.cardinality);

        let matches = scored
            .into_iter()
            .map(|(member, score)| Match::new(member, score))
            .collect();

        Ok(self.finish(scratch, stats, matches))
    }

    fn finish(&self, scratch: &ScratchSpace, mut stats: PipelineStats, matches: Vec<Match>) -> Vec<Match> {
        stats.returned = matches.len();

        info!(
            request_id = %scratch.request_id,
            pool = stats.pool,
            filtered = stats.filtered,
            received = stats.received,
            given = stats.given,
            combined = stats.combined,
            scored = stats.scored,
            returned = stats.returned,
            "Recommend completed"
        );

        matches
    }

    async fn release(&self, scratch: &ScratchSpace) {
        match self.store.delete(&scratch.keys()).await {
            Ok(()) => debug!(request_id = %scratch.request_id, "Scratch lists released"),
            Err(err) => warn!(
                request_id = %scratch.request_id,
                error = %err,
                "Failed to release scratch lists"
            ),
        }
    }
}

/// First occurrence of each attribute, in input order
fn distinct(attributes: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    attributes
        .iter()
        .map(String::as_str)
        .filter(move |a| seen.insert(*a))
}
