// Scoring helpers for matching-service

/// Harmonic mean of two one-directional interest scores.
///
/// Returns `None` when either side is zero: a one-sided match has no
/// reciprocal score and the candidate is dropped rather than scored.
pub fn reciprocal_score(given: f64, received: f64) -> Option<f64> {
    if given == 0.0 || received == 0.0 {
        return None;
    }
    Some(2.0 / (1.0 / given + 1.0 / received))
}

/// Sum in ascending order of magnitude to keep rounding error low when many
/// small weights sit next to a few large ones.
pub fn stable_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(|a, b| {
        a.abs()
            .partial_cmp(&b.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    values.into_iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reciprocal_score() {
        assert_eq!(reciprocal_score(4.0, 4.0), Some(4.0));
        assert!((reciprocal_score(1.0, 9.0).unwrap() - 1.8).abs() < 1e-12);
        assert_eq!(reciprocal_score(0.0, 9.0), None);
        assert_eq!(reciprocal_score(9.0, 0.0), None);
    }

    #[test]
    fn test_reciprocal_penalizes_asymmetry() {
        let balanced = reciprocal_score(0.5, 0.5).unwrap();
        let lopsided = reciprocal_score(0.99, 0.01).unwrap();
        assert!(balanced > lopsided);
    }

    #[test]
    fn test_stable_sum() {
        assert_eq!(stable_sum(Vec::<f64>::new()), 0.0);
        assert_eq!(stable_sum(vec![2.0, 1.0]), 3.0);

        let mut values = vec![1.0e16];
        values.extend(std::iter::repeat(1.0).take(100));
        assert_eq!(stable_sum(values), 1.0e16 + 100.0);
    }
}
