//! Reciprocal-rank fusion of keyword and semantic result lists.

use std::collections::HashMap;

/// RRF dampening constant; higher flattens the rank contribution curve.
pub const RRF_K: f64 = 60.0;

/// Fuses two ranked id lists with reciprocal-rank fusion.
///
/// `alpha` weights the keyword list; `1 - alpha` the semantic list
/// (default 0.5 upstream). Each id scores
/// `alpha / (k + kw_rank) + (1 - alpha) / (k + sem_rank)` over the lists it
/// appears in. Ties break by keyword rank, then id for determinism.
pub fn reciprocal_rank_fusion(
    keyword_ids: &[i64],
    semantic_ids: &[i64],
    alpha: f64,
) -> Vec<(i64, f64)> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut scores: HashMap<i64, f64> = HashMap::new();
    let mut keyword_rank: HashMap<i64, usize> = HashMap::new();

    for (rank, id) in keyword_ids.iter().enumerate() {
        *scores.entry(*id).or_default() += alpha / (RRF_K + rank as f64);
        keyword_rank.entry(*id).or_insert(rank);
    }
    for (rank, id) in semantic_ids.iter().enumerate() {
        *scores.entry(*id).or_default() += (1.0 - alpha) / (RRF_K + rank as f64);
    }

    let mut fused: Vec<(i64, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ka = keyword_rank.get(&a.0).copied().unwrap_or(usize::MAX);
                let kb = keyword_rank.get(&b.0).copied().unwrap_or(usize::MAX);
                ka.cmp(&kb)
            })
            .then_with(|| a.0.cmp(&b.0))
    });
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_in_both_lists_rise() {
        let fused = reciprocal_rank_fusion(&[1, 2, 3], &[2, 1, 4], 0.5);
        let order: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        // 1 and 2 appear in both lists; 1 wins the keyword-rank tie break.
        assert_eq!(order[0], 1);
        assert_eq!(order[1], 2);
        assert!(order.contains(&3));
        assert!(order.contains(&4));
    }

    #[test]
    fn alpha_one_is_pure_keyword() {
        let fused = reciprocal_rank_fusion(&[1, 2], &[3], 1.0);
        let order: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(order[0], 1);
        assert_eq!(order[1], 2);
        // The semantic-only id scored zero.
        assert_eq!(fused.last().unwrap().1, 0.0);
    }

    #[test]
    fn scores_descend() {
        let fused = reciprocal_rank_fusion(&[1, 2, 3], &[4, 5, 6], 0.5);
        for pair in fused.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn empty_lists_fuse_to_empty() {
        assert!(reciprocal_rank_fusion(&[], &[], 0.5).is_empty());
    }
}
