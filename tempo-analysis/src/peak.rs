//! Band-restricted peak picking shared by both estimators

/// Index of the largest `values[i]` over the candidate indices
///
/// Ties resolve to the first candidate, matching a plain argmax.
/// Returns `None` when there are no candidates.
pub(crate) fn first_max<I>(values: &[f32], candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut best: Option<(usize, f32)> = None;
    for idx in candidates {
        let value = values[idx];
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_max_within_candidates() {
        let values = [9.0, 1.0, 3.0, 2.0, 8.0];
        assert_eq!(first_max(&values, 1..4), Some(2));
    }

    #[test]
    fn test_ties_resolve_to_first() {
        let values = [0.0, 5.0, 5.0, 5.0];
        assert_eq!(first_max(&values, 1..4), Some(1));
    }

    #[test]
    fn test_no_candidates() {
        let values = [1.0, 2.0];
        assert_eq!(first_max(&values, std::iter::empty()), None);
    }
}
