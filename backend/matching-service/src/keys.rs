//! Index key schema
//!
//! Every posting list the service touches is addressed through these builders.
//! Key format: v{VERSION}:{namespace}:{entity}:{identifier}[:sub_key]

use uuid::Uuid;

/// Key schema version - increment when changing key formats
pub const KEY_VERSION: u32 = 1;

/// Key builder bound to one deployment namespace
#[derive(Debug, Clone)]
pub struct IndexKey {
    namespace: String,
}

impl IndexKey {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn prefix(&self) -> String {
        format!("v{}:{}", KEY_VERSION, self.namespace)
    }

    // ============= Attribute Keys =============

    /// Members holding an attribute (score always 1.0)
    /// Format: v1:{ns}:attr:{attribute}:members
    pub fn presence(&self, attribute: &str) -> String {
        format!("{}:attr:{}:members", self.prefix(), attribute)
    }

    /// Members interested in an attribute (score = normalized interest)
    /// Format: v1:{ns}:attr:{attribute}:interested
    pub fn interested(&self, attribute: &str) -> String {
        let (head, tail) = self.interested_affixes();
        format!("{}{}{}", head, attribute, tail)
    }

    /// The two halves around the attribute in [`IndexKey::interested`], for
    /// stores that build those keys themselves
    pub fn interested_affixes(&self) -> (String, String) {
        (format!("{}:attr:", self.prefix()), ":interested".to_string())
    }

    // ============= Member Keys =============

    /// Attributes a member holds
    /// Format: v1:{ns}:member:{member_id}:attributes
    pub fn member_attributes(&self, member_id: &str) -> String {
        format!("{}:member:{}:attributes", self.prefix(), member_id)
    }

    /// Accumulated raw interest weights
    /// Format: v1:{ns}:member:{member_id}:interest:raw
    pub fn raw_interest(&self, member_id: &str) -> String {
        format!("{}:member:{}:interest:raw", self.prefix(), member_id)
    }

    /// Normalized interest weights (sum to 1.0)
    /// Format: v1:{ns}:member:{member_id}:interest
    pub fn normalized_interest(&self, member_id: &str) -> String {
        format!("{}:member:{}:interest", self.prefix(), member_id)
    }

    // ============= Scratch Keys =============

    /// Per-query intermediate list
    /// Format: v1:{ns}:scratch:{request_id}:{stage}
    pub fn scratch(&self, request_id: Uuid, stage: &str) -> String {
        format!("{}:scratch:{}:{}", self.prefix(), request_id, stage)
    }
}

impl Default for IndexKey {
    fn default() -> Self {
        Self::new("match")
    }
}
