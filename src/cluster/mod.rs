//! Diagonal-proximity clustering and chain selection over raw matches,
//! porting `mgaps.hh`'s `ClusterMatches` (spec.md §4.4).

pub mod union_find;

use rayon::prelude::*;

use crate::config::ClusterConfig;
use crate::match_finder::Match;

use union_find::{DisjointSets, UnionFind};

/// A match augmented with the bookkeeping fields `Process_Cluster`'s chain
/// DP needs, porting `mgaps.hh`'s `Match_t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtMatch {
    pub start1: i64,
    pub start2: i64,
    pub len: i64,
    pub reverse: bool,
    simple_score: i64,
    simple_from: i64,
    simple_adj: i64,
    cluster_id: i64,
    good: bool,
    /// Carried from `Match_t::Tentative`; not consulted by clustering
    /// itself, left for a downstream synteny merge pass to flag matches
    /// pending confirmation (spec.md §4.6).
    pub tentative: bool,
}

impl From<Match> for ExtMatch {
    fn from(m: Match) -> Self {
        ExtMatch {
            start1: m.ref_pos,
            start2: m.query_pos,
            len: m.len,
            reverse: m.reverse,
            simple_score: 0,
            simple_from: -1,
            simple_adj: 0,
            cluster_id: 0,
            good: false,
            tentative: false,
        }
    }
}

fn by_start2(a: &ExtMatch, b: &ExtMatch) -> std::cmp::Ordering {
    a.start2.cmp(&b.start2).then(a.start1.cmp(&b.start1))
}

fn by_cluster(a: &ExtMatch, b: &ExtMatch) -> std::cmp::Ordering {
    a.cluster_id.cmp(&b.cluster_id).then_with(|| by_start2(a, b))
}

pub struct MatchClusterer {
    config: ClusterConfig,
}

impl MatchClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        MatchClusterer { config }
    }

    /// Drops matches whose reference and query span is entirely contained
    /// in the immediately preceding (by `Start2`) kept match — the
    /// "internal to a repeat" filter `mgaps.hh` declares as
    /// `Filter_Matches` but does not define in this retrieval (its body
    /// lives outside the filtered source set). This reconstruction removes
    /// exactly the matches the doc comment describes: those wholly nested,
    /// on both sequences, inside another match already seen in `Start2`
    /// order.
    fn filter_internal_repeats(matches: Vec<ExtMatch>) -> Vec<ExtMatch> {
        let mut kept: Vec<ExtMatch> = Vec::with_capacity(matches.len());
        for m in matches {
            let redundant = kept.last().is_some_and(|last: &ExtMatch| {
                m.start1 >= last.start1
                    && m.start1 + m.len <= last.start1 + last.len
                    && m.start2 >= last.start2
                    && m.start2 + m.len <= last.start2 + last.len
            });
            if !redundant {
                kept.push(m);
            }
        }
        kept
    }

    fn diagonal_threshold(&self, sep: i64) -> i64 {
        self.config
            .fixed_separation
            .max((self.config.separation_factor * sep as f64) as i64)
    }

    /// Serial clustering path, porting `Cluster_each`.
    ///
    /// `mgaps.hh` clusters one ordering of matches at a time — forward and
    /// reverse-complement matches live in separate coordinate systems on
    /// the query side, so a forward and a reverse match that happen to
    /// share a diagonal must never be unioned together. Matches are split
    /// by `.reverse` before the diagonal union-find runs, and each strand
    /// is clustered independently.
    pub fn cluster_each(&self, matches: Vec<Match>) -> Vec<Vec<ExtMatch>> {
        let (forward, reverse): (Vec<Match>, Vec<Match>) =
            matches.into_iter().partition(|m| !m.reverse);
        let mut clusters = self.cluster_each_one_strand(forward);
        clusters.extend(self.cluster_each_one_strand(reverse));
        clusters
    }

    fn cluster_each_one_strand(&self, matches: Vec<Match>) -> Vec<Vec<ExtMatch>> {
        let mut a: Vec<ExtMatch> = matches.into_iter().map(ExtMatch::from).collect();
        a.sort_by(by_start2);
        let mut a = Self::filter_internal_repeats(a);
        let n = a.len();

        let mut uf = UnionFind::new();
        uf.reset(n);

        for i in 0..n.saturating_sub(1) {
            let i_end = a[i].start2 + a[i].len;
            let i_diag = a[i].start2 - a[i].start1;
            for j in (i + 1)..n {
                let sep = a[j].start2 - i_end;
                if sep > self.config.max_separation {
                    break;
                }
                let diag_diff = ((a[j].start2 - a[j].start1) - i_diag).abs();
                if diag_diff <= self.diagonal_threshold(sep) {
                    uf.union_sets((i + 1) as i64, (j + 1) as i64);
                }
            }
        }

        for (i, m) in a.iter_mut().enumerate() {
            m.cluster_id = uf.find((i + 1) as i64);
        }
        a.sort_by(by_cluster);

        let mut clusters = Vec::new();
        let mut i = 0;
        while i < n {
            let mut j = i + 1;
            while j < n && a[i].cluster_id == a[j].cluster_id {
                j += 1;
            }
            self.process_cluster(&a[i..j], &mut clusters);
            i = j;
        }
        clusters
    }

    /// Parallel clustering path for long queries with many matches, porting
    /// `Cluster_each_long`: lock-free union-find, a genuinely parallel sort
    /// instead of the original's half-disabled `openmp_qsort`/`omp task`
    /// (DESIGN.md, Open Question 3), and per-cluster chain DP run
    /// concurrently across clusters.
    ///
    /// Like [`Self::cluster_each`], forward and reverse matches are split
    /// before clustering so the two coordinate systems never mix.
    pub fn cluster_long(&self, matches: Vec<Match>) -> Vec<Vec<ExtMatch>> {
        let (forward, reverse): (Vec<Match>, Vec<Match>) =
            matches.into_iter().partition(|m| !m.reverse);
        let mut clusters = self.cluster_long_one_strand(forward);
        clusters.extend(self.cluster_long_one_strand(reverse));
        clusters
    }

    fn cluster_long_one_strand(&self, matches: Vec<Match>) -> Vec<Vec<ExtMatch>> {
        let mut a: Vec<ExtMatch> = matches.into_iter().map(ExtMatch::from).collect();
        a.par_sort_unstable_by(by_start2);
        let mut a = Self::filter_internal_repeats(a);
        let n = a.len();

        let ds = DisjointSets::new(n + 1);
        (0..n.saturating_sub(1)).into_par_iter().for_each(|i| {
            let i_end = a[i].start2 + a[i].len;
            let i_diag = a[i].start2 - a[i].start1;
            for j in (i + 1)..n {
                let sep = a[j].start2 - i_end;
                if sep > self.config.max_separation {
                    break;
                }
                let diag_diff = ((a[j].start2 - a[j].start1) - i_diag).abs();
                if diag_diff <= self.diagonal_threshold(sep) {
                    ds.union_sets((i + 1) as i64, (j + 1) as i64);
                }
            }
        });

        for (i, m) in a.iter_mut().enumerate() {
            m.cluster_id = ds.find((i + 1) as i64);
        }
        a.par_sort_unstable_by(by_cluster);

        let mut bounds = Vec::new();
        let mut i = 0;
        while i < n {
            let mut j = i + 1;
            while j < n && a[i].cluster_id == a[j].cluster_id {
                j += 1;
            }
            bounds.push((i, j));
            i = j;
        }

        bounds
            .into_par_iter()
            .flat_map(|(lo, hi)| {
                let mut clusters = Vec::new();
                self.process_cluster(&a[lo..hi], &mut clusters);
                clusters
            })
            .collect()
    }

    /// Chain-selects the best-scoring path through a group of
    /// same-diagonal-component matches, peeling accepted chains off and
    /// repeating until no candidates remain, porting `Process_Cluster`.
    fn process_cluster(&self, segment: &[ExtMatch], out: &mut Vec<Vec<ExtMatch>>) {
        let mut remaining: Vec<ExtMatch> = segment.to_vec();

        while !remaining.is_empty() {
            let n = remaining.len();
            for i in 0..n {
                remaining[i].simple_score = remaining[i].len;
                remaining[i].simple_adj = 0;
                remaining[i].simple_from = -1;
                for j in 0..i {
                    let olap1 = remaining[j].start1 + remaining[j].len - remaining[i].start1;
                    let olap2 = remaining[j].start2 + remaining[j].len - remaining[i].start2;
                    let olap = olap1.max(olap2).max(0);
                    let pen = olap
                        + ((remaining[i].start2 - remaining[i].start1)
                            - (remaining[j].start2 - remaining[j].start1))
                            .abs();
                    if remaining[j].simple_score + remaining[i].len - pen > remaining[i].simple_score {
                        remaining[i].simple_from = j as i64;
                        remaining[i].simple_score = remaining[j].simple_score + remaining[i].len - pen;
                        remaining[i].simple_adj = olap;
                    }
                }
            }

            let mut best = 0;
            for i in 1..n {
                if remaining[i].simple_score > remaining[best].simple_score {
                    best = i;
                }
            }

            let mut total = 0i64;
            let mut hi = i64::MIN;
            let mut lo = i64::MAX;
            let mut idx = best as i64;
            while idx >= 0 {
                let i = idx as usize;
                remaining[i].good = true;
                total += remaining[i].len;
                hi = hi.max(remaining[i].start1 + remaining[i].len);
                lo = lo.min(remaining[i].start1);
                idx = remaining[i].simple_from;
            }
            let score = if self.config.use_extent { hi - lo } else { total };

            if score >= self.config.min_output_score {
                let cluster: Vec<ExtMatch> = remaining.iter().filter(|m| m.good).copied().collect();
                out.push(cluster);
            }

            remaining.retain(|m| !m.good);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(r: i64, q: i64, len: i64) -> Match {
        Match {
            ref_pos: r,
            query_pos: q,
            len,
            reverse: false,
        }
    }

    #[test]
    fn colinear_matches_merge_into_one_cluster() {
        let clusterer = MatchClusterer::new(ClusterConfig::new().min_output_score(10));
        let matches = vec![m(1, 1, 20), m(25, 25, 20), m(50, 50, 20)];
        let clusters = clusterer.cluster_each(matches);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 3);
    }

    #[test]
    fn distant_diagonals_stay_separate() {
        let clusterer = MatchClusterer::new(
            ClusterConfig::new()
                .max_separation(5)
                .fixed_separation(1)
                .min_output_score(5),
        );
        let matches = vec![m(1, 1, 20), m(1000, 1000, 20)];
        let clusters = clusterer.cluster_each(matches);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn low_scoring_clusters_are_dropped() {
        let clusterer = MatchClusterer::new(ClusterConfig::new().min_output_score(1000));
        let matches = vec![m(1, 1, 5)];
        let clusters = clusterer.cluster_each(matches);
        assert!(clusters.is_empty());
    }

    #[test]
    fn serial_and_parallel_paths_agree_on_totals() {
        let config = ClusterConfig::new().min_output_score(10);
        let matches = vec![m(1, 1, 20), m(25, 25, 20), m(500, 500, 20)];
        let serial = MatchClusterer::new(config).cluster_each(matches.clone());
        let parallel = MatchClusterer::new(config).cluster_long(matches);
        let serial_total: usize = serial.iter().map(|c| c.len()).sum();
        let parallel_total: usize = parallel.iter().map(|c| c.len()).sum();
        assert_eq!(serial_total, parallel_total);
    }
}
