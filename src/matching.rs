//! Brute-force descriptor matching with symmetric cross-check

use crate::features::Descriptor;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A descriptor correspondence between a query set and a train set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DescriptorMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Euclidean distance between the two descriptors
    pub distance: f32,
}

/// Matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Keep only mutually nearest pairs
    pub cross_check: bool,
    /// Lowe ratio test threshold (best / second best), disabled when `None`
    pub ratio_threshold: Option<f32>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            cross_check: true,
            ratio_threshold: None,
        }
    }
}

/// Exhaustive L2 nearest-neighbour matcher
#[derive(Debug, Clone, Default)]
pub struct DescriptorMatcher {
    config: MatcherConfig,
}

#[derive(Clone, Copy)]
struct Nearest {
    index: usize,
    distance_sq: f32,
    second_sq: f32,
}

impl DescriptorMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Match every query descriptor against `train`.
    ///
    /// Returns matches sorted ascending by distance; ties keep query order.
    pub fn match_descriptors(&self, query: &[Descriptor], train: &[Descriptor]) -> Vec<DescriptorMatch> {
        if query.is_empty() || train.is_empty() {
            return Vec::new();
        }

        let forward: Vec<Nearest> = query.par_iter().map(|q| nearest(q, train)).collect();
        let backward: Option<Vec<usize>> = self
            .config
            .cross_check
            .then(|| train.par_iter().map(|t| nearest(t, query).index).collect());

        let mut matches: Vec<DescriptorMatch> = forward
            .iter()
            .enumerate()
            .filter(|(query_idx, best)| match &backward {
                Some(reverse) => reverse[best.index] == *query_idx,
                None => true,
            })
            .filter(|(_, best)| match self.config.ratio_threshold {
                Some(ratio) if best.second_sq.is_finite() => {
                    best.distance_sq.sqrt() < ratio * best.second_sq.sqrt()
                }
                _ => true,
            })
            .map(|(query_idx, best)| DescriptorMatch {
                query_idx,
                train_idx: best.index,
                distance: best.distance_sq.sqrt(),
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.query_idx.cmp(&b.query_idx)));

        log::debug!(
            "Matched {} of {} query descriptors against {} (cross-check: {})",
            matches.len(),
            query.len(),
            train.len(),
            self.config.cross_check
        );
        matches
    }
}

fn distance_sq(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// First strictly nearest descriptor in `set`
fn nearest(query: &Descriptor, set: &[Descriptor]) -> Nearest {
    let mut best = Nearest {
        index: 0,
        distance_sq: f32::INFINITY,
        second_sq: f32::INFINITY,
    };
    for (index, candidate) in set.iter().enumerate() {
        let d = distance_sq(query, candidate);
        if d < best.distance_sq {
            best.second_sq = best.distance_sq;
            best.distance_sq = d;
            best.index = index;
        } else if d < best.second_sq {
            best.second_sq = d;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::DESCRIPTOR_SIZE;

    fn descriptor(hot: usize, value: f32) -> Descriptor {
        let mut d = [0.0; DESCRIPTOR_SIZE];
        d[hot] = value;
        d
    }

    #[test]
    fn test_empty_sets() {
        let matcher = DescriptorMatcher::default();
        assert!(matcher.match_descriptors(&[], &[descriptor(0, 1.0)]).is_empty());
        assert!(matcher.match_descriptors(&[descriptor(0, 1.0)], &[]).is_empty());
    }

    #[test]
    fn test_matches_sorted_by_distance() {
        let query = vec![descriptor(0, 1.0), descriptor(1, 1.0), descriptor(2, 1.0)];
        let train = vec![descriptor(2, 0.9), descriptor(0, 0.5), descriptor(1, 1.0)];

        let matches = DescriptorMatcher::default().match_descriptors(&query, &train);
        let pairs: Vec<_> = matches.iter().map(|m| (m.query_idx, m.train_idx)).collect();
        assert_eq!(pairs, vec![(1, 2), (2, 0), (0, 1)]);
        assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_cross_check_drops_one_sided_pairs() {
        // Both queries are closest to train 0, but train 0 only prefers query 0
        let query = vec![descriptor(0, 1.0), descriptor(0, 0.7)];
        let train = vec![descriptor(0, 0.95), descriptor(5, 1.0)];

        let checked = DescriptorMatcher::default().match_descriptors(&query, &train);
        assert_eq!(checked.len(), 1);
        assert_eq!((checked[0].query_idx, checked[0].train_idx), (0, 0));

        let unchecked = DescriptorMatcher::new(MatcherConfig {
            cross_check: false,
            ratio_threshold: None,
        })
        .match_descriptors(&query, &train);
        assert_eq!(unchecked.len(), 2);
    }

    #[test]
    fn test_ratio_test_rejects_ambiguous() {
        let query = vec![descriptor(0, 1.0)];
        let train = vec![descriptor(0, 0.9), descriptor(0, 0.88)];
        let matcher = DescriptorMatcher::new(MatcherConfig {
            cross_check: false,
            ratio_threshold: Some(0.75),
        });
        assert!(matcher.match_descriptors(&query, &train).is_empty());
    }

    #[test]
    fn test_identical_sets_match_themselves() {
        let set: Vec<_> = (0..6).map(|i| descriptor(i, 1.0)).collect();
        let matches = DescriptorMatcher::default().match_descriptors(&set, &set);
        assert_eq!(matches.len(), 6);
        assert!(matches.iter().all(|m| m.query_idx == m.train_idx && m.distance == 0.0));
    }
}
