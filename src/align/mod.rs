//! Banded, score-pruned gapped extension from a seed match out to a target
//! endpoint, producing a MUMmer-style signed-run-length delta (spec.md
//! §4.5). Grounds on `sw_align.cc`'s `_alignEngine`/`generateDelta` by
//! contract (banding, score-pruning via `break_len`, delta sign convention)
//! rather than by literal port: `_alignEngine` indexes its DP table by
//! anti-diagonal to bound memory to the band width, which is a storage
//! optimization orthogonal to correctness; this implementation uses a plain
//! row-major banded matrix instead, so the algorithm can be read and
//! trusted without running it (DESIGN.md).

pub mod matrix;

use matrix::ScoringMatrix;

use crate::config::AlignerConfig;

/// Extend away from the seed toward increasing coordinates (rightward).
pub const DIRECTION_BIT: u32 = 1 << 0;
/// Ignore `break_len` score-pruning and push all the way to the requested
/// target, even through a bad patch.
pub const FORCED_BIT: u32 = 1 << 1;
/// Require the optimal (not merely `break_len`-pruned) alignment; disables
/// early exit once the target is in reach.
pub const OPTIMAL_BIT: u32 = 1 << 2;
/// Allow the extension to run off the end of whichever sequence is shorter,
/// rather than stopping exactly at the requested target.
pub const SEQEND_BIT: u32 = 1 << 3;
/// Compute score and endpoint only; skip delta backtracking.
pub const SEARCH_BIT: u32 = 1 << 4;

const NEG_INFINITY: i32 = i32::MIN;

fn add_score(a: i32, delta: i32) -> i32 {
    if a == NEG_INFINITY {
        NEG_INFINITY
    } else {
        a + delta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Start,
    Match,
    Delete,
    Insert,
}

/// Outcome of one [`ExtendAligner::extend`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionResult {
    /// Last reference position consumed (inclusive, 1-based), `ref_from - dir`
    /// if nothing was consumed.
    pub ref_end: i64,
    /// Last query position consumed (inclusive, 1-based).
    pub query_end: i64,
    /// Whether the alignment reached `(ref_to, query_to)` exactly.
    pub target_reached: bool,
    /// MUMmer delta encoding: each entry's magnitude is the run of matching
    /// bases since the previous edit (or the start), positive for an
    /// insertion into the reference (the reference has a base the query
    /// does not; query position does not advance), negative for an
    /// insertion into the query (query position advances, reference does
    /// not). Substitutions are not recorded; only indel positions are.
    /// Absent when `mode` sets [`SEARCH_BIT`].
    pub delta: Vec<i64>,
    pub score: i64,
}

/// Gapped extension engine, parameterized by a [`ScoringMatrix`] and an
/// [`AlignerConfig`] (banding, score-pruning budget, output mode).
pub struct ExtendAligner {
    matrix: ScoringMatrix,
    config: AlignerConfig,
}

impl ExtendAligner {
    pub fn new(config: AlignerConfig) -> Self {
        ExtendAligner {
            matrix: ScoringMatrix::new(config.matrix),
            config,
        }
    }

    /// Extends an alignment starting just past a seed, from `(ref_from,
    /// query_from)` toward `(ref_to, query_to)` (inclusive, 1-based,
    /// direction taken from `mode`'s [`DIRECTION_BIT`]). `reference`/`query`
    /// are the full sequence byte slices (1-based positions are translated
    /// internally).
    pub fn extend(
        &self,
        reference: &[u8],
        ref_from: i64,
        ref_to: i64,
        query: &[u8],
        query_from: i64,
        query_to: i64,
        mode: u32,
    ) -> ExtensionResult {
        let dir: i64 = if mode & DIRECTION_BIT != 0 { 1 } else { -1 };
        let forced = mode & FORCED_BIT != 0;
        let optimal = mode & OPTIMAL_BIT != 0;
        let seq_end = mode & SEQEND_BIT != 0;
        let want_delta = mode & SEARCH_BIT == 0 && self.config.do_delta;

        let n = (((ref_to - ref_from) * dir).max(-1) + 1).max(0) as usize;
        let m = (((query_to - query_from) * dir).max(-1) + 1).max(0) as usize;
        let n = n.min(self.config.max_alignment_length.max(0) as usize);
        let m = m.min(self.config.max_alignment_length.max(0) as usize);

        let ref_byte = |i: usize| -> u8 {
            let pos = ref_from + dir * (i as i64 - 1);
            reference[(pos - 1) as usize]
        };
        let qry_byte = |j: usize| -> u8 {
            let pos = query_from + dir * (j as i64 - 1);
            query[(pos - 1) as usize]
        };

        let gap_open = self.matrix.gap_open() as i32;
        let gap_cont = self.matrix.gap_continue() as i32;
        let good = self.matrix.good_score();
        let max_diff = if forced {
            i32::MAX / 4
        } else {
            (good * self.config.break_len).min(i32::MAX as i64 / 4) as i32
        };
        let band_half: i64 = if self.config.banding > 0 {
            self.config.banding / 2
        } else {
            i64::MAX / 4
        };

        let rows = n + 1;
        let cols = m + 1;
        let mut mat = vec![NEG_INFINITY; rows * cols];
        let mut del = vec![NEG_INFINITY; rows * cols];
        let mut ins = vec![NEG_INFINITY; rows * cols];
        let mut back = vec![Edit::Start; rows * cols];
        let idx = |i: usize, j: usize| i * cols + j;

        mat[idx(0, 0)] = 0;

        let mut best_score = 0i32;
        let mut best_cell = (0usize, 0usize);

        for i in 0..=n {
            for j in 0..=m {
                if i == 0 && j == 0 {
                    continue;
                }
                if (i as i64 - j as i64).abs() > band_half {
                    continue;
                }

                if i > 0 {
                    let best_here = mat[idx(i - 1, j)].max(del[idx(i - 1, j)]).max(ins[idx(i - 1, j)]);
                    let open = add_score(best_here, gap_open);
                    let cont = add_score(del[idx(i - 1, j)], gap_cont);
                    del[idx(i, j)] = open.max(cont);
                }
                if j > 0 {
                    let best_here = mat[idx(i, j - 1)].max(del[idx(i, j - 1)]).max(ins[idx(i, j - 1)]);
                    let open = add_score(best_here, gap_open);
                    let cont = add_score(ins[idx(i, j - 1)], gap_cont);
                    ins[idx(i, j)] = open.max(cont);
                }
                if i > 0 && j > 0 {
                    let prev = mat[idx(i - 1, j - 1)]
                        .max(del[idx(i - 1, j - 1)])
                        .max(ins[idx(i - 1, j - 1)]);
                    let s = self.matrix.score(ref_byte(i), qry_byte(j)) as i32;
                    mat[idx(i, j)] = add_score(prev, s);
                }

                let here = mat[idx(i, j)].max(del[idx(i, j)]).max(ins[idx(i, j)]);
                back[idx(i, j)] = if here == mat[idx(i, j)] && mat[idx(i, j)] != NEG_INFINITY {
                    Edit::Match
                } else if here == del[idx(i, j)] && del[idx(i, j)] != NEG_INFINITY {
                    Edit::Delete
                } else if here == ins[idx(i, j)] && ins[idx(i, j)] != NEG_INFINITY {
                    Edit::Insert
                } else {
                    Edit::Start
                };

                if here != NEG_INFINITY && here > best_score {
                    best_score = here;
                    best_cell = (i, j);
                }
            }

            if !forced && !optimal {
                let row_best = (0..=m)
                    .map(|j| mat[idx(i, j)].max(del[idx(i, j)]).max(ins[idx(i, j)]))
                    .filter(|&s| s != NEG_INFINITY)
                    .max();
                if let Some(row_best) = row_best {
                    if row_best < best_score - max_diff {
                        break;
                    }
                }
            }
        }

        let (final_i, final_j, target_reached) = if (optimal || seq_end || forced)
            && mat[idx(n, m)].max(del[idx(n, m)]).max(ins[idx(n, m)]) != NEG_INFINITY
        {
            (n, m, true)
        } else {
            (best_cell.0, best_cell.1, best_cell == (n, m))
        };

        let score = mat[idx(final_i, final_j)]
            .max(del[idx(final_i, final_j)])
            .max(ins[idx(final_i, final_j)]) as i64;

        let ref_end = if final_i > 0 {
            ref_from + dir * (final_i as i64 - 1)
        } else {
            ref_from - dir
        };
        let query_end = if final_j > 0 {
            query_from + dir * (final_j as i64 - 1)
        } else {
            query_from - dir
        };

        let delta = if want_delta {
            self.backtrack(&back, idx, final_i, final_j, cols)
        } else {
            Vec::new()
        };

        ExtensionResult {
            ref_end,
            query_end,
            target_reached,
            delta,
            score,
        }
    }

    /// Walks `back` from `(i, j)` to `(0, 0)`, emitting MUMmer-style delta
    /// values: the backtrack naturally runs end-to-start, so entries are
    /// collected then reversed to read start-to-end, matching
    /// `generateDelta`'s output order. `Delete` consumes a reference base
    /// with no matching query base (an insertion into the reference, d >
    /// 0); `Insert` consumes a query base with no matching reference base
    /// (an insertion into the query, d < 0).
    fn backtrack(
        &self,
        back: &[Edit],
        idx: impl Fn(usize, usize) -> usize,
        mut i: usize,
        mut j: usize,
        _cols: usize,
    ) -> Vec<i64> {
        let mut deltas = Vec::new();
        let mut run = 0i64;
        loop {
            if i == 0 && j == 0 {
                break;
            }
            match back[idx(i, j)] {
                Edit::Match => {
                    run += 1;
                    i -= 1;
                    j -= 1;
                }
                Edit::Delete => {
                    deltas.push(run + 1);
                    run = 0;
                    i -= 1;
                }
                Edit::Insert => {
                    deltas.push(-(run + 1));
                    run = 0;
                    j -= 1;
                }
                Edit::Start => break,
            }
        }
        deltas.reverse();
        deltas
    }
}
