use super::{AttributeIndex, InterestIndex, RecommendationEngine};
use crate::config::MatchingConfig;
use crate::error::{MatchError, Result};
use crate::keys::IndexKey;
use crate::models::{Match, MatchQuery};
use crate::store::PostingStore;
use std::sync::Arc;
use tracing::debug;

/// Matching service: the ingestion indices and the recommend pipeline over
/// one shared store.
pub struct MatchingService<S> {
    attributes: AttributeIndex<S>,
    interests: InterestIndex<S>,
    engine: RecommendationEngine<S>,
}

impl<S: PostingStore> MatchingService<S> {
    pub fn new(store: Arc<S>, config: MatchingConfig) -> Self {
        let keys = IndexKey::new(config.key_namespace.clone());
        Self {
            attributes: AttributeIndex::new(store.clone(), keys.clone()),
            interests: InterestIndex::new(store.clone(), keys.clone()),
            engine: RecommendationEngine::new(store, keys, config),
        }
    }

    pub fn attributes(&self) -> &AttributeIndex<S> {
        &self.attributes
    }

    pub fn interests(&self) -> &InterestIndex<S> {
        &self.interests
    }

    pub async fn add_attributes<A: AsRef<str>>(
        &self,
        member_id: &str,
        attributes: &[A],
    ) -> Result<()> {
        self.attributes.add_attributes(member_id, attributes).await
    }

    pub async fn record_interest<A: AsRef<str>>(
        &self,
        actor_id: &str,
        delta: f64,
        attributes: &[A],
    ) -> Result<()> {
        self.interests
            .record_interest(actor_id, delta, attributes)
            .await
    }

    pub async fn recommend(&self, query: &MatchQuery) -> Result<Vec<Match>> {
        self.engine.recommend(query).await
    }

    /// Recommend on behalf of a stored member: their attributes and
    /// normalized interests fill in the query, and they never match
    /// themselves.
    pub async fn recommend_for(
        &self,
        member_id: &str,
        cardinality: usize,
        or_filters: &[String],
        and_filters: &[String],
    ) -> Result<Vec<Match>> {
        if member_id.is_empty() {
            return Err(MatchError::InvalidArgument(
                "member_id must not be empty".to_string(),
            ));
        }

        let (my_attributes, my_interests) = tokio::try_join!(
            self.attributes.member_attributes(member_id),
            self.interests.normalized_interest(member_id),
        )?;

        debug!(
            member_id = member_id,
            attributes = my_attributes.len(),
            interests = my_interests.len(),
            "Query built from stored profile"
        );

        let query = MatchQuery {
            // one extra slot in case the member ranks themselves
            cardinality: cardinality.saturating_add(1),
            or_filters: or_filters.to_vec(),
            and_filters: and_filters.to_vec(),
            my_attributes,
            my_interests,
        };

        let mut matches = self.engine.recommend(&query).await?;
        matches.retain(|m| m.member_id != member_id);
        matches.truncate(cardinality);

        Ok(matches)
    }
}
