mod query;

pub use query::MatchQuery;

use serde::{Deserialize, Serialize};

/// One ranked recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub member_id: String,
    /// Harmonic mean of given and received interest
    pub score: f64,
}

impl Match {
    pub fn new(member_id: impl Into<String>, score: f64) -> Self {
        Self {
            member_id: member_id.into(),
            score,
        }
    }
}

/// Per-stage sizes of one recommend run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub pool: usize,
    pub filtered: usize,
    pub received: usize,
    pub given: usize,
    pub combined: usize,
    pub scored: usize,
    pub returned: usize,
}
