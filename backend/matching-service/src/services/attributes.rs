// ============================================
// Attribute Index (屬性倒排索引)
// ============================================
//
// Who holds which attribute, in both directions:
// - attr:{attribute}:members     member → 1.0
// - member:{member_id}:attributes attribute → 1.0
//
// Add-only. One AddAttributes call is one atomic batch, so a concurrent
// query sees all of the call's attributes or none of them.

use super::validate_ingest;
use crate::error::Result;
use crate::keys::IndexKey;
use crate::store::{PostingStore, WriteBatch};
use std::sync::Arc;
use tracing::debug;

/// Presence score written for every held attribute
pub const PRESENT: f64 = 1.0;

pub struct AttributeIndex<S> {
    store: Arc<S>,
    keys: IndexKey,
}

impl<S: PostingStore> AttributeIndex<S> {
    pub fn new(store: Arc<S>, keys: IndexKey) -> Self {
        Self { store, keys }
    }

    /// Record that `member_id` holds every attribute in `attributes`.
    ///
    /// Idempotent and order-independent.
    pub async fn add_attributes<A: AsRef<str>>(
        &self,
        member_id: &str,
        attributes: &[A],
    ) -> Result<()> {
        validate_ingest("member_id", member_id, attributes)?;

        let member_key = self.keys.member_attributes(member_id);
        let mut batch = WriteBatch::new();
        for attribute in attributes {
            let attribute = attribute.as_ref();
            batch
                .set(self.keys.presence(attribute), member_id, PRESENT)
                .set(member_key.as_str(), attribute, PRESENT);
        }

        self.store.apply(batch).await?;

        debug!(
            member_id = member_id,
            attributes = attributes.len(),
            "Attributes added"
        );

        Ok(())
    }

    /// Attributes held by a member, sorted
    pub async fn member_attributes(&self, member_id: &str) -> Result<Vec<String>> {
        let entries = self
            .store
            .entries(&self.keys.member_attributes(member_id))
            .await?;
        let mut attributes: Vec<String> = entries.into_keys().collect();
        attributes.sort();
        Ok(attributes)
    }

    /// Members holding an attribute, sorted
    pub async fn members_with(&self, attribute: &str) -> Result<Vec<String>> {
        let entries = self.store.entries(&self.keys.presence(attribute)).await?;
        let mut members: Vec<String> = entries.into_keys().collect();
        members.sort();
        Ok(members)
    }

    pub async fn has_attribute(&self, member_id: &str, attribute: &str) -> Result<bool> {
        Ok(self
            .store
            .score(&self.keys.presence(attribute), member_id)
            .await?
            .is_some())
    }
}
