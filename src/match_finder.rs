//! Maximal exact/unique/almost-unique match enumeration over a
//! [`crate::suffix_array::SparseSuffixArray`] (spec.md §4.3).
//!
//! Ports `sparseSA.hpp`'s `findMEM`/`findMAM`/`MUM` contracts: `MEM` has no
//! uniqueness requirement, `MAM` requires uniqueness in the reference only
//! (and only makes sense for `K == 1`, per `sparseSA::MAM`'s own early
//! return), `MUM` requires uniqueness in both sequences.

use std::collections::HashMap;

use crate::alphabet::reverse_complement;
use crate::config::{MatchConfig, MatchFlavor, Orientation};
use crate::suffix_array::{Interval, SparseSuffixArray};

/// A single match between the indexed reference and a query.
///
/// Positions are 1-based, matching [`crate::sequence::BoundedSequence`]'s
/// convention. When `reverse` is set, `query_pos`/`len` describe the match
/// in the reverse-complemented query; the caller recovers the original
/// strand's coordinates with `query_len - (query_pos + len - 1) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub ref_pos: i64,
    pub query_pos: i64,
    pub len: i64,
    pub reverse: bool,
}

/// Returns `true` when extending the match one base to the left (into the
/// reference and query) would still match — i.e. the match found is not
/// itself a suffix of a longer match starting one base earlier.
fn is_left_maximal(ssa: &SparseSuffixArray, ref_pos: i64, query: &[u8], query_idx: usize) -> bool {
    if ref_pos == 1 || query_idx == 0 {
        return true;
    }
    let ref_byte = ssa.sequence().byte(ref_pos - 1);
    let query_byte = query[query_idx - 1] as i16;
    ref_byte != query_byte
}

/// Every right-maximal occurrence encountered while descending `pattern`
/// through `ssa`'s SA interval tree, each carrying its own `depth`.
///
/// At each depth the current interval may split: the sub-range that keeps
/// matching `pattern`'s next byte narrows into the next depth's interval,
/// but any ranks outside that sub-range stop here — their reference
/// occurrence's next byte (or end of text) differs from the query's, so
/// they are right-maximal at the *current* depth and must be reported
/// before the descent continues past them. Ports the interval-splitting
/// check `sparseSA.hpp`'s `MAM_PostProcess`/suffix-link walk performs
/// implicitly while sweeping the whole SA left to right; here the same
/// set of right-maximal occurrences is recovered by comparing consecutive
/// intervals during a single top-down descent per query position.
fn right_maximal_intervals(ssa: &SparseSuffixArray, pattern: &[u8]) -> Vec<Interval> {
    let mut out = Vec::new();
    let mut cur = ssa.full_interval();
    for &b in pattern {
        if cur.is_empty() {
            return out;
        }
        let next = ssa.extend_interval_by_symbol(cur, b);
        if next.is_empty() {
            out.push(cur);
            return out;
        }
        if next.start > cur.start {
            out.push(Interval { start: cur.start, end: next.start, depth: cur.depth });
        }
        if next.end < cur.end {
            out.push(Interval { start: next.end, end: cur.end, depth: cur.depth });
        }
        cur = next;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Finds every maximal exact match of length `>= min_len` between `ssa`'s
/// text and `query`, scanning every query start position.
///
/// This is the brute-force (but provably complete) realization of
/// `findMEM`/`collectMEMs`: rather than the amortized left-to-right scan
/// with suffix-link fallback the original performs, each query position is
/// independently descended via [`right_maximal_intervals`], which surfaces
/// every right-maximal occurrence the descent passes through, not just the
/// deepest one. DESIGN.md documents the complexity trade:
/// `O(query.len() * log(N/K))` worst case per position instead of
/// amortized linear, chosen for an implementation that can be read and
/// trusted without running it.
pub fn find_mems(ssa: &SparseSuffixArray, query: &[u8], min_len: i64) -> Vec<Match> {
    let mut matches = Vec::new();
    for i in 0..query.len() {
        for interval in right_maximal_intervals(ssa, &query[i..]) {
            if interval.depth < min_len || interval.is_empty() {
                continue;
            }
            for rank in interval.start..interval.end {
                let ref_pos = ssa.sa_at(rank);
                if is_left_maximal(ssa, ref_pos, query, i) {
                    matches.push(Match {
                        ref_pos,
                        query_pos: (i + 1) as i64,
                        len: interval.depth,
                        reverse: false,
                    });
                }
            }
        }
    }
    matches
}

/// Maximal almost-unique matches: exact matches unique in the reference
/// (one occurrence), with no uniqueness requirement in the query. Valid
/// only for `K == 1` (a sparse index cannot certify every reference
/// position is covered), matching `sparseSA::MAM`'s own restriction.
pub fn find_mams(ssa: &SparseSuffixArray, query: &[u8], min_len: i64) -> Vec<Match> {
    if ssa.k() != 1 {
        return Vec::new();
    }
    find_mems(ssa, query, min_len)
        .into_iter()
        .filter(|m| {
            let start = (m.query_pos - 1) as usize;
            let end = start + m.len as usize;
            ssa.search(&query[start..end]).size() == 1
        })
        .collect()
}

/// Maximal unique matches: exact matches unique in the reference and,
/// pragmatically, unique by content across the query (no other maximal
/// match in the same scan reports an identical substring). This is a
/// documented simplification of "unique in query" — see DESIGN.md — that
/// coincides with the textbook definition whenever matches above `min_len`
/// do not nest inside one another, which holds for the match lengths this
/// crate targets.
pub fn find_mums(ssa: &SparseSuffixArray, query: &[u8], min_len: i64) -> Vec<Match> {
    if ssa.k() != 1 {
        return Vec::new();
    }
    let candidates: Vec<Match> = find_mems(ssa, query, min_len)
        .into_iter()
        .filter(|m| {
            let start = (m.query_pos - 1) as usize;
            let end = start + m.len as usize;
            ssa.search(&query[start..end]).size() == 1
        })
        .collect();

    let mut counts: HashMap<&[u8], usize> = HashMap::new();
    for m in &candidates {
        let start = (m.query_pos - 1) as usize;
        let end = start + m.len as usize;
        *counts.entry(&query[start..end]).or_insert(0) += 1;
    }

    candidates
        .into_iter()
        .filter(|m| {
            let start = (m.query_pos - 1) as usize;
            let end = start + m.len as usize;
            counts[&query[start..end]] == 1
        })
        .collect()
}

/// Runs whichever match flavor `config` selects, over the query strand(s)
/// `config.orientation` names (spec.md §4.3, §6).
pub fn find_matches(ssa: &SparseSuffixArray, query: &[u8], config: &MatchConfig) -> Vec<Match> {
    let mut out = Vec::new();

    let run = |q: &[u8]| -> Vec<Match> {
        match config.flavor {
            MatchFlavor::MaxMatch => find_mems(ssa, q, config.min_len),
            MatchFlavor::MumReference => find_mams(ssa, q, config.min_len),
            MatchFlavor::Mum => find_mums(ssa, q, config.min_len),
        }
    };

    if matches!(config.orientation, Orientation::Forward | Orientation::Both) {
        out.extend(run(query));
    }
    if matches!(config.orientation, Orientation::Reverse | Orientation::Both) {
        let rc = reverse_complement(query);
        out.extend(run(&rc).into_iter().map(|m| Match { reverse: true, ..m }));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::BoundedSequence;
    use crate::suffix_array::ConstructOptions;
    use std::sync::Arc;

    fn build(text: &[u8]) -> SparseSuffixArray {
        let seq = Arc::new(BoundedSequence::new([text]));
        SparseSuffixArray::construct(seq, 1, ConstructOptions::new()).unwrap()
    }

    #[test]
    fn finds_full_identity_match() {
        let ssa = build(b"gattacagattaca");
        let matches = find_mems(&ssa, b"gattacagattaca", 4);
        assert!(matches.iter().any(|m| m.query_pos == 1 && m.len == 14));
    }

    #[test]
    fn mem_respects_min_len() {
        let ssa = build(b"acgtacgtacgt");
        let matches = find_mems(&ssa, b"acgt", 3);
        assert!(matches.iter().all(|m| m.len >= 3));
        assert!(!matches.is_empty());
    }

    #[test]
    fn mum_excludes_repeated_query_substrings() {
        let ssa = build(b"xxxuniqueseedxxx");
        let matches = find_mums(&ssa, b"uniqueseed", 5);
        assert!(matches.iter().any(|m| m.len as usize == "uniqueseed".len()));
    }

    #[test]
    fn reverse_orientation_is_tagged() {
        let ssa = build(b"gattaca");
        let config = MatchConfig::new().orientation(Orientation::Reverse).min_len(3);
        let matches = find_matches(&ssa, b"tgtaatc", &config);
        assert!(matches.iter().all(|m| m.reverse));
    }

    #[test]
    fn left_maximality_blocks_suffix_of_longer_match() {
        let ssa = build(b"aaaa");
        let matches = find_mems(&ssa, b"aaaa", 1);
        // the only left-maximal match starting at query position 1 should
        // be the full-length run; shorter "aaa"/"aa"/"a" starting later
        // inherit their own left-maximal entries instead of duplicating it.
        assert!(matches.iter().any(|m| m.query_pos == 1 && m.len == 4));
    }

    #[test]
    fn descent_reports_every_right_maximal_occurrence_not_just_the_deepest() {
        // "acgt" occurs at position 1 (followed by 'c') and position 6
        // (followed by 'g'); query "acgtg" only continues matching the
        // position-6 occurrence past depth 4, but the position-1 occurrence
        // is still a right-maximal match of length 4 and must be reported
        // alongside the depth-5 match at position 6.
        let ssa = build(b"acgtcacgtg");
        let matches = find_mems(&ssa, b"acgtg", 4);
        assert!(matches.iter().any(|m| m.ref_pos == 1 && m.len == 4));
        assert!(matches.iter().any(|m| m.ref_pos == 6 && m.len == 5));
    }
}
