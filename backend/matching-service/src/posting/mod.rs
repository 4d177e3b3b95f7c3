//! Posting-list algebra
//!
//! A posting list maps a member (or attribute) identifier to a score. These
//! functions are the in-process counterpart of the sorted-set primitives the
//! Redis store delegates to `ZUNIONSTORE` / `ZINTERSTORE` / `ZREVRANGE`, with
//! the source weights and the aggregate always passed explicitly.

use std::cmp::Ordering;
use std::collections::HashMap;

/// Identifier → score mapping for one index entry.
pub type PostingList = HashMap<String, f64>;

/// How scores of the same identifier coming from several sources combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    /// Redis `AGGREGATE` argument
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }

    fn combine(self, acc: f64, value: f64) -> f64 {
        match self {
            Aggregate::Sum => acc + value,
            Aggregate::Min => acc.min(value),
            Aggregate::Max => acc.max(value),
        }
    }
}

/// A source list for a union or intersection, with its multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedKey {
    pub key: String,
    pub weight: f64,
}

impl WeightedKey {
    pub fn new(key: impl Into<String>, weight: f64) -> Self {
        Self {
            key: key.into(),
            weight,
        }
    }

    /// Source with weight 1
    pub fn unit(key: impl Into<String>) -> Self {
        Self::new(key, 1.0)
    }
}

/// Weighted union: every identifier present in any source, scored by
/// aggregating `score × weight` across the sources that contain it.
pub fn weighted_union(sources: &[(&PostingList, f64)], aggregate: Aggregate) -> PostingList {
    let mut out = PostingList::new();

    for (list, weight) in sources {
        for (id, score) in list.iter() {
            let weighted = weighted_score(*score, *weight);
            out.entry(id.clone())
                .and_modify(|acc| *acc = aggregate.combine(*acc, weighted))
                .or_insert(weighted);
        }
    }

    out
}

/// Weighted intersection: only identifiers present in every source survive.
/// An empty source set yields an empty list.
pub fn weighted_intersection(sources: &[(&PostingList, f64)], aggregate: Aggregate) -> PostingList {
    let Some(smallest) = sources.iter().map(|(list, _)| *list).min_by_key(|l| l.len()) else {
        return PostingList::new();
    };

    let mut out = PostingList::new();

    'candidates: for id in smallest.keys() {
        let mut acc: Option<f64> = None;
        for (list, weight) in sources {
            let Some(score) = list.get(id) else {
                continue 'candidates;
            };
            let weighted = weighted_score(*score, *weight);
            acc = Some(match acc {
                Some(current) => aggregate.combine(current, weighted),
                None => weighted,
            });
        }
        if let Some(score) = acc {
            out.insert(id.clone(), score);
        }
    }

    out
}

/// Entries sorted by score descending, ties by identifier ascending, cut to
/// `limit`.
pub fn top_desc(list: &PostingList, limit: usize) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = list
        .iter()
        .map(|(id, score)| (id.clone(), *score))
        .collect();
    entries.sort_by(score_ordering);
    entries.truncate(limit);
    entries
}

/// Descending score, then ascending identifier.
pub fn score_ordering(a: &(String, f64), b: &(String, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

// Redis treats 0 × ±inf as 0; mirror it so a zero weight always gates.
fn weighted_score(score: f64, weight: f64) -> f64 {
    if weight == 0.0 {
        0.0
    } else {
        score * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(&str, f64)]) -> PostingList {
        entries
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect()
    }

    #[test]
    fn test_union_sums_weighted_scores() {
        let a = list(&[("m1", 1.0), ("m2", 1.0)]);
        let b = list(&[("m2", 1.0), ("m3", 1.0)]);

        let out = weighted_union(&[(&a, 0.5), (&b, 2.0)], Aggregate::Sum);

        assert_eq!(out.len(), 3);
        assert_eq!(out["m1"], 0.5);
        assert_eq!(out["m2"], 2.5);
        assert_eq!(out["m3"], 2.0);
    }

    #[test]
    fn test_union_of_nothing_is_empty() {
        assert!(weighted_union(&[], Aggregate::Sum).is_empty());
    }

    #[test]
    fn test_union_min_max() {
        let a = list(&[("m1", 3.0)]);
        let b = list(&[("m1", 5.0)]);

        assert_eq!(weighted_union(&[(&a, 1.0), (&b, 1.0)], Aggregate::Min)["m1"], 3.0);
        assert_eq!(weighted_union(&[(&a, 1.0), (&b, 1.0)], Aggregate::Max)["m1"], 5.0);
    }

    #[test]
    fn test_intersection_requires_every_source() {
        let a = list(&[("m1", 1.0), ("m2", 1.0), ("m3", 1.0)]);
        let b = list(&[("m2", 2.0), ("m3", 4.0)]);
        let c = list(&[("m3", 8.0), ("m4", 1.0)]);

        let out = weighted_intersection(&[(&a, 1.0), (&b, 1.0), (&c, 1.0)], Aggregate::Sum);

        assert_eq!(out.len(), 1);
        assert_eq!(out["m3"], 13.0);
    }

    #[test]
    fn test_intersection_zero_weights_gate_membership() {
        let pool = list(&[("m1", 3.0), ("m2", 1.0)]);
        let gate = list(&[("m1", 1.0)]);

        let out = weighted_intersection(&[(&pool, 0.0), (&gate, 0.0)], Aggregate::Sum);

        assert_eq!(out.len(), 1);
        assert_eq!(out["m1"], 0.0);
    }

    #[test]
    fn test_intersection_with_empty_source_is_empty() {
        let a = list(&[("m1", 1.0)]);
        let empty = PostingList::new();

        assert!(weighted_intersection(&[(&a, 1.0), (&empty, 1.0)], Aggregate::Sum).is_empty());
        assert!(weighted_intersection(&[], Aggregate::Sum).is_empty());
    }

    #[test]
    fn test_top_desc_orders_and_limits() {
        let l = list(&[("b", 2.0), ("a", 2.0), ("c", 5.0), ("d", 0.5)]);

        let top = top_desc(&l, 3);

        assert_eq!(
            top,
            vec![
                ("c".to_string(), 5.0),
                ("a".to_string(), 2.0),
                ("b".to_string(), 2.0)
            ]
        );
    }

    #[test]
    fn test_aggregate_redis_names() {
        assert_eq!(Aggregate::Sum.as_str(), "SUM");
        assert_eq!(Aggregate::default(), Aggregate::Sum);
    }
}
