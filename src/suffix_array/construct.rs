//! Construction of the sparse enhanced suffix array: `SA`, `ISA`, `LCP`,
//! optional `CHILD` and `KMER` tables (spec.md §4.2).

use libsais::ThreadCount;

use crate::alphabet::{BASE_RANK, NOT_A_BASE, SEPARATOR};
use crate::sequence::BoundedSequence;

use super::cell::Cells;
use super::lcp::LcpArray;

/// Dense translation alphabet used only for suffix-array construction: a
/// terminator (`0`), the record separator (`1`), then the five DNA symbols
/// in their natural ASCII order (`a c g n t`), which already sorts
/// correctly relative to the separator (spec.md §3's ordering requirement
/// falls out of plain ASCII order: `` ` `` (0x60) < `a` (0x61) < `c` (0x63) <
/// `g` (0x67) < `n` (0x6e) < `t` (0x74)).
fn dense_rank(byte: u8) -> u8 {
    match byte {
        b'a' => 2,
        b'c' => 3,
        b'g' => 4,
        b'n' => 5,
        b't' => 6,
        x if x == SEPARATOR => 1,
        _ => 7, // anything unexpected sorts after every real symbol
    }
}

/// Builds the translated buffer libsais sorts: the sequence bytes mapped
/// through [`dense_rank`], followed by a unique terminator smaller than
/// every other symbol.
fn dense_construction_buffer(seq: &BoundedSequence) -> Vec<u8> {
    let mut buf: Vec<u8> = seq.slice().iter().map(|&b| dense_rank(b)).collect();
    buf.push(0);
    buf
}

/// Builds the full (K=1) suffix array of `seq` via `libsais`, exactly as the
/// teacher's `IndexStorage::construct_libsais_suffix_array` calls into the
/// crate, then drops the terminator entry and converts to 1-based
/// positions.
fn build_dense_suffix_array(seq: &BoundedSequence) -> Vec<i64> {
    let buf = dense_construction_buffer(seq);
    let n = buf.len();

    let mut sa_buffer = vec![0i32; n];

    let construction = libsais::SuffixArrayConstruction::for_text(&buf)
        .in_borrowed_buffer(&mut sa_buffer)
        .multi_threaded(ThreadCount::fixed(
            rayon::current_num_threads()
                .try_into()
                .expect("thread count should fit into u16"),
        ));

    construction.run().expect("libsais suffix array construction");

    sa_buffer
        .into_iter()
        .filter_map(|zero_based| {
            let one_based = zero_based as i64 + 1;
            (one_based <= seq.len()).then_some(one_based)
        })
        .collect()
}

/// Builds the sparse suffix array: every `K`-th position of the full (K=1)
/// suffix array, restricted to positions `p` with `(p - 1) % K == 0`.
///
/// A subsequence of a totally sorted sequence, restricted to any subset, is
/// itself sorted in the induced order; this is why filtering the dense SA
/// is a correct (if not asymptotically optimal for huge `K`) way to build
/// the sparse SA (spec.md §4.2 leaves the algorithm unspecified beyond the
/// SA identity invariant).
pub fn build_sparse_suffix_array(seq: &BoundedSequence, k: i64) -> Vec<i64> {
    assert!(k >= 1);
    let dense = build_dense_suffix_array(seq);
    if k == 1 {
        return dense;
    }
    dense
        .into_iter()
        .filter(|&pos| (pos - 1) % k == 0)
        .collect()
}

/// Builds `ISA` from `SA`, satisfying `SA[ISA[i]] = i` for `i` in sample
/// index space (`i = (pos - 1) / K`).
pub fn build_isa(sa: &[i64], k: i64, cells: &mut Cells) {
    for (rank, &pos) in sa.iter().enumerate() {
        let sample_index = ((pos - 1) / k) as usize;
        cells.set(sample_index, rank as i64);
    }
}

/// Kasai's algorithm adapted for a sparse SA: the running overlap `h` is
/// decremented by `K` (instead of `1`) each step, since consecutive sample
/// positions in text order are `K` bytes apart (spec.md §4.2).
pub fn build_lcp(seq: &BoundedSequence, sa: &[i64], isa: &Cells, k: i64) -> LcpArray {
    let m = sa.len();
    let mut lcp = LcpArray::new(m);
    if m == 0 {
        return lcp;
    }

    let mut h: i64 = 0;
    for j in 0..m {
        let pos = 1 + (j as i64) * k;
        let rank = isa.get(j) as usize;
        if rank > 0 {
            let prev_pos = sa[rank - 1];
            while seq.byte(pos + h) == seq.byte(prev_pos + h) && seq.byte(pos + h) >= 0 {
                h += 1;
            }
            // one more comparison allowed when both are still equal on
            // sentinel-free real bytes is covered above; separators (real
            // bytes, not sentinels) correctly stop the overlap too because
            // they are unequal to any letter, and equal only when prev_pos
            // and pos are both sitting on a separator, which still needs
            // the loop to keep extending.
            lcp.set(rank, h);
        } else {
            lcp.set(rank, 0);
            h = 0;
        }
        h = (h - k).max(0);
    }
    lcp.set(0, 0);
    lcp.finalize();
    lcp
}

/// Two-stack pass building the Abouelhoda-Kurtz `up`/`down`/`next-l-index`
/// values, collapsed into a single `i64` per node as spec.md §3 asks:
/// `child[i]` holds `down[i]` when defined, else `next_l_index[i]`; `up[i]`
/// is folded into the predecessor's slot (`child[i - 1] = up[i]`) since
/// `up[i]` and `down[i - 1]` are never simultaneously needed for the same
/// cell in the classic ESA layout.
pub fn build_child(lcp: &LcpArray) -> Vec<i64> {
    let m = lcp.len();
    let mut child = vec![-1i64; m];

    if m == 0 {
        return child;
    }

    // Pass 1: up/down via an explicit stack of LCP-interval boundaries.
    let mut stack: Vec<usize> = vec![0];
    for i in 1..m {
        let mut last_popped: Option<usize> = None;
        while lcp.get(i) < lcp.get(*stack.last().unwrap()) {
            last_popped = stack.pop();
            if let Some(lp) = last_popped {
                let top = *stack.last().unwrap();
                if lcp.get(i) <= lcp.get(top) && lcp.get(top) != lcp.get(lp) {
                    // down[top] = lp, folded into child[top - 1] slot when
                    // free, else overwritten directly: down takes priority
                    // over up at the same cell, matching the original
                    // collapsing rule.
                    if top > 0 {
                        child[top - 1] = lp as i64;
                    }
                }
            }
        }
        if let Some(lp) = last_popped {
            // up[i] folded into child[i - 1]
            if i > 0 {
                child[i - 1] = lp as i64;
            }
        }
        stack.push(i);
    }

    // Pass 2: next-l-index chains, overwriting only cells still unset by
    // pass 1 (a cell holds at most one of up/down/next-l-index).
    let mut stack: Vec<usize> = vec![0];
    for i in 1..m {
        while lcp.get(i) < lcp.get(*stack.last().unwrap()) {
            stack.pop();
        }
        let top = *stack.last().unwrap();
        if lcp.get(i) == lcp.get(top) {
            if child[top] == -1 {
                child[top] = i as i64;
            }
            stack.pop();
        }
        stack.push(i);
    }

    child
}

/// The number of nucleotide symbols a k-mer table indexes over.
pub const KMER_ALPHABET_SIZE: usize = 4;

/// Builds the k-mer lookup table: for every k-mer over `{a,c,g,t}`, the
/// half-open SA interval where that k-mer is a prefix, or an empty
/// interval if the k-mer does not occur or contains a non-ACGT byte in its
/// first `k` bases (spec.md §4.2, §9 open question).
///
/// Implemented as a bounded descent through binary-search interval
/// extension (see [`super::SparseSuffixArray::extend_interval_by_symbol`]),
/// rather than an independent DFS, since both produce identical half-open
/// intervals and reusing the already-verified extension logic removes an
/// entire class of construction bugs (DESIGN.md, Open Question 4).
pub fn kmer_index(kmer_bytes: &[u8]) -> Option<usize> {
    let mut index = 0usize;
    for &b in kmer_bytes {
        let rank = BASE_RANK[b as usize];
        if rank == NOT_A_BASE {
            return None;
        }
        index = index * KMER_ALPHABET_SIZE + rank as usize;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_rank_preserves_ascii_order() {
        assert!(dense_rank(SEPARATOR) < dense_rank(b'a'));
        assert!(dense_rank(b'a') < dense_rank(b'c'));
        assert!(dense_rank(b'c') < dense_rank(b'g'));
        assert!(dense_rank(b'g') < dense_rank(b'n'));
        assert!(dense_rank(b'n') < dense_rank(b't'));
    }

    #[test]
    fn sparse_sa_is_subsequence_of_dense() {
        let seq = BoundedSequence::new([b"gattacagattaca".as_slice()]);
        let dense = build_sparse_suffix_array(&seq, 1);
        let sparse = build_sparse_suffix_array(&seq, 2);
        for &pos in &sparse {
            assert_eq!((pos - 1) % 2, 0);
            assert!(dense.contains(&pos));
        }
        // order preserved
        let mut sorted = sparse.clone();
        sorted.sort();
        assert_eq!(sparse, sorted);
    }

    #[test]
    fn kmer_index_rejects_non_acgt() {
        assert!(kmer_index(b"acgt").is_some());
        assert!(kmer_index(b"acnt").is_none());
        assert_eq!(kmer_index(b"a"), Some(0));
        assert_eq!(kmer_index(b"c"), Some(1));
        assert_eq!(kmer_index(b"t"), Some(3));
    }
}
