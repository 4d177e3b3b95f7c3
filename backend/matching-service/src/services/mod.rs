pub mod attributes;
pub mod interests;
pub mod matching;
pub mod recommend;

pub use attributes::AttributeIndex;
pub use interests::InterestIndex;
pub use matching::MatchingService;
pub use recommend::{RecommendationEngine, ScratchSpace};

use crate::error::{MatchError, Result};

/// Shared ingestion checks: non-empty id, non-empty attribute list, no empty
/// attribute names.
pub(crate) fn validate_ingest<A: AsRef<str>>(
    id_label: &str,
    id: &str,
    attributes: &[A],
) -> Result<()> {
    if id.is_empty() {
        return Err(MatchError::InvalidArgument(format!(
            "{} must not be empty",
            id_label
        )));
    }
    if attributes.is_empty() {
        return Err(MatchError::InvalidArgument(
            "attributes must not be empty".to_string(),
        ));
    }
    if attributes.iter().any(|a| a.as_ref().is_empty()) {
        return Err(MatchError::InvalidArgument(
            "attribute must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ingest() {
        assert!(validate_ingest("member_id", "m1", &["gender:f"]).is_ok());
        assert!(validate_ingest("member_id", "", &["gender:f"]).is_err());
        assert!(validate_ingest::<&str>("member_id", "m1", &[]).is_err());
        assert!(validate_ingest("member_id", "m1", &["gender:f", ""]).is_err());
    }
}
