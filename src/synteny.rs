//! Synteny merge: stitches clustered matches into full alignments by
//! gap-filling with [`crate::align::ExtendAligner`], then recomputes each
//! alignment's error counts from its delta (spec.md §4.6). Grounds on
//! `postnuc.cc`'s `merge_syntenys::extendClusters`/`parseDelta` by contract;
//! DESIGN.md records where this diverges from the original's exact
//! cross-cluster target search.

use crate::align::{ExtendAligner, DIRECTION_BIT, FORCED_BIT, OPTIMAL_BIT, SEQEND_BIT};
use crate::cluster::ExtMatch;
use crate::config::AlignerConfig;

/// One diagonal-proximity cluster as emitted by
/// [`crate::cluster::MatchClusterer`], augmented with the bookkeeping
/// `extendClusters` needs (`wasFused` in the original).
#[derive(Debug, Clone)]
pub struct Cluster {
    pub matches: Vec<ExtMatch>,
    pub reverse: bool,
    pub was_fused: bool,
}

impl Cluster {
    pub fn new(mut matches: Vec<ExtMatch>) -> Self {
        matches.sort_by_key(|m| m.start1);
        let reverse = matches.first().map(|m| m.reverse).unwrap_or(false);
        Cluster {
            matches,
            reverse,
            was_fused: false,
        }
    }

    fn start_a(&self) -> i64 {
        self.matches.first().map(|m| m.start1).unwrap_or(0)
    }
}

/// A finished gapless-seed-plus-gap-filled alignment, porting `Alignment`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub s_a: i64,
    pub e_a: i64,
    pub s_b: i64,
    pub e_b: i64,
    pub reverse: bool,
    pub delta: Vec<i64>,
    pub errors: i64,
    pub sim_errors: i64,
    pub non_alphas: i64,
}

/// Stitches clusters into alignments and fills each alignment's error
/// counts, porting `merge_syntenys`.
pub struct SyntenyMerger {
    aligner: ExtendAligner,
    config: AlignerConfig,
}

impl SyntenyMerger {
    pub fn new(config: AlignerConfig) -> Self {
        SyntenyMerger {
            aligner: ExtendAligner::new(config),
            config,
        }
    }

    /// Connects the matches within each cluster, then (if
    /// `config.do_extend`) extends each cluster's first/last match toward
    /// the neighboring cluster (or, for the outermost clusters, toward the
    /// sequence boundary when `config.to_seq_end` is set). Clusters are
    /// taken in ascending reference-start order, and a forward extension
    /// targets only the immediately following cluster rather than
    /// scanning every later cluster for the closest/best target the way
    /// `getForwardTargetCluster` does — DESIGN.md Open Question 9.
    pub fn extend_clusters(
        &self,
        clusters: Vec<Cluster>,
        reference: &[u8],
        ref_len: i64,
        query: &[u8],
        query_rc: Option<&[u8]>,
        query_len: i64,
    ) -> Vec<Alignment> {
        let mut clusters = clusters;
        clusters.sort_by_key(|c| c.start_a());

        let mut alignments: Vec<Alignment> = Vec::new();

        for (ci, cluster) in clusters.iter().enumerate() {
            if cluster.matches.is_empty() {
                continue;
            }
            let strand_query: &[u8] = if cluster.reverse {
                query_rc.unwrap_or(query)
            } else {
                query
            };

            let first = &cluster.matches[0];
            let mut s_a = first.start1;
            let mut s_b = first.start2;
            let last = cluster.matches.last().unwrap();
            let mut e_a = last.start1 + last.len - 1;
            let mut e_b = last.start2 + last.len - 1;
            let mut delta = Vec::new();

            for pair in cluster.matches.windows(2) {
                let (cur, next) = (pair[0], pair[1]);
                let gap_a = next.start1 - (cur.start1 + cur.len);
                let gap_b = next.start2 - (cur.start2 + cur.len);
                if gap_a <= 0 && gap_b <= 0 {
                    continue;
                }
                let result = self.aligner.extend(
                    reference,
                    cur.start1 + cur.len,
                    next.start1 - 1,
                    strand_query,
                    cur.start2 + cur.len,
                    next.start2 - 1,
                    DIRECTION_BIT | FORCED_BIT | OPTIMAL_BIT,
                );
                delta.extend(result.delta);
            }

            if self.config.do_extend {
                let mut mode = OPTIMAL_BIT;
                if self.config.to_seq_end {
                    mode |= SEQEND_BIT;
                }
                let back_target = if ci > 0 {
                    let prev = &clusters[ci - 1];
                    prev.matches.last().map(|m| (m.start1 + m.len, m.start2 + m.len))
                } else {
                    None
                };
                let (target_a, target_b) = back_target.unwrap_or((1, 1));
                if target_a < s_a {
                    let back = self.aligner.extend(
                        reference,
                        s_a - 1,
                        target_a,
                        strand_query,
                        s_b - 1,
                        target_b,
                        mode,
                    );
                    if back.target_reached || self.config.to_seq_end {
                        let mut rev_delta: Vec<i64> = back.delta.iter().map(|&d| -d).rev().collect();
                        rev_delta.extend(delta);
                        delta = rev_delta;
                        s_a = back.ref_end.min(s_a);
                        s_b = back.query_end.min(s_b);
                    }
                }

                let forward_target = clusters
                    .get(ci + 1)
                    .and_then(|c| c.matches.first())
                    .map(|m| (m.start1, m.start2))
                    .unwrap_or((ref_len, query_len));
                if forward_target.0 > e_a {
                    let fwd = self.aligner.extend(
                        reference,
                        e_a + 1,
                        forward_target.0,
                        strand_query,
                        e_b + 1,
                        forward_target.1,
                        DIRECTION_BIT | mode,
                    );
                    if fwd.target_reached || self.config.to_seq_end {
                        delta.extend(fwd.delta);
                        e_a = fwd.ref_end.max(e_a);
                        e_b = fwd.query_end.max(e_b);
                    }
                }
            }

            alignments.push(Alignment {
                s_a,
                e_a,
                s_b,
                e_b,
                reverse: cluster.reverse,
                delta,
                errors: 0,
                sim_errors: 0,
                non_alphas: 0,
            });
        }

        self.parse_delta(&mut alignments, reference, query, query_rc);
        alignments
    }

    /// Walks each alignment's delta against the actual sequence bytes to
    /// fill in `errors`/`sim_errors`/`non_alphas`, porting `parseDelta`.
    /// A "similarity error" is any position whose substitution score is
    /// below the good-match threshold (mismatches always count; so do
    /// indel positions).
    fn parse_delta(
        &self,
        alignments: &mut [Alignment],
        reference: &[u8],
        query: &[u8],
        query_rc: Option<&[u8]>,
    ) {
        let matrix = crate::align::matrix::ScoringMatrix::new(self.config.matrix);
        for al in alignments.iter_mut() {
            let strand_query: &[u8] = if al.reverse { query_rc.unwrap_or(query) } else { query };
            let mut a_pos = al.s_a;
            let mut b_pos = al.s_b;
            let mut errors = 0i64;
            let mut sim_errors = 0i64;
            let mut non_alphas = 0i64;

            for &d in &al.delta {
                let run = d.unsigned_abs() as i64;
                for _ in 1..run {
                    let (ch1, ch2, bad1, bad2) = Self::read_pair(reference, strand_query, a_pos, b_pos);
                    non_alphas += bad1 as i64 + bad2 as i64;
                    if matrix.score(ch1, ch2) < 1 {
                        sim_errors += 1;
                    }
                    if ch1.to_ascii_uppercase() != ch2.to_ascii_uppercase() {
                        errors += 1;
                    }
                    a_pos += 1;
                    b_pos += 1;
                }
                errors += 1;
                sim_errors += 1;
                if d > 0 {
                    a_pos += 1;
                } else {
                    b_pos += 1;
                }
            }

            while a_pos <= al.e_a && b_pos <= al.e_b {
                let (ch1, ch2, bad1, bad2) = Self::read_pair(reference, strand_query, a_pos, b_pos);
                non_alphas += bad1 as i64 + bad2 as i64;
                if matrix.score(ch1, ch2) < 1 {
                    sim_errors += 1;
                }
                if ch1.to_ascii_uppercase() != ch2.to_ascii_uppercase() {
                    errors += 1;
                }
                a_pos += 1;
                b_pos += 1;
            }

            al.errors = errors;
            al.sim_errors = sim_errors;
            al.non_alphas = non_alphas;
        }
    }

    fn read_pair(reference: &[u8], query: &[u8], a_pos: i64, b_pos: i64) -> (u8, u8, bool, bool) {
        let idx_a = (a_pos - 1) as usize;
        let idx_b = (b_pos - 1) as usize;
        let raw1 = reference.get(idx_a).copied().unwrap_or(b'x');
        let raw2 = query.get(idx_b).copied().unwrap_or(b'x');
        let bad1 = !raw1.is_ascii_alphabetic();
        let bad2 = !raw2.is_ascii_alphabetic();
        let ch1 = if bad1 { b'X' } else { raw1 };
        let ch2 = if bad2 { b'X' } else { raw2 };
        (ch1, ch2, bad1, bad2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ExtMatch;
    use crate::config::AlignerConfig;
    use crate::match_finder::Match;

    fn ext(r: i64, q: i64, len: i64) -> ExtMatch {
        ExtMatch::from(Match {
            ref_pos: r,
            query_pos: q,
            len,
            reverse: false,
        })
    }

    #[test]
    fn single_match_cluster_needs_no_internal_delta() {
        let merger = SyntenyMerger::new(AlignerConfig::new().do_extend(false));
        let cluster = Cluster::new(vec![ext(1, 1, 8)]);
        let reference = b"ACGTACGT";
        let query = b"ACGTACGT";
        let alignments = merger.extend_clusters(vec![cluster], reference, 8, query, None, 8);
        assert_eq!(alignments.len(), 1);
        assert!(alignments[0].delta.is_empty());
        assert_eq!(alignments[0].errors, 0);
    }

    #[test]
    fn two_matches_with_a_gap_connect_through_one_alignment() {
        let merger = SyntenyMerger::new(AlignerConfig::new().do_extend(false));
        let reference = b"ACGTTTACGT";
        let query = b"ACGTACGT";
        let cluster = Cluster::new(vec![ext(1, 1, 4), ext(8, 5, 3)]);
        let alignments = merger.extend_clusters(vec![cluster], reference, 10, query, None, 8);
        assert_eq!(alignments.len(), 1);
        assert_eq!(alignments[0].s_a, 1);
        assert_eq!(alignments[0].e_a, 10);
    }
}
