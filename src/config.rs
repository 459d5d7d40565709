//! Configuration options passed to the aligner, mirroring spec.md §6.
//!
//! Builder style, following the teacher's `FmIndexConfig`: plain structs with
//! `new()` and chainable setters, `Default` carrying the documented
//! defaults.

/// Selects which flavor of maximal exact match [`crate::match_finder`]
/// enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFlavor {
    /// Maximal unique match: unique in both reference and query.
    Mum,
    /// Maximal almost-unique match: unique in the reference only. Requires
    /// `K == 1`.
    MumReference,
    /// Maximal exact match, no uniqueness requirement.
    MaxMatch,
}

/// Which strand(s) of the query to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Forward,
    Reverse,
    Both,
}

/// Thresholds controlling diagonal clustering and chain acceptance in
/// [`crate::cluster::MatchClusterer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    pub(crate) fixed_separation: i64,
    pub(crate) max_separation: i64,
    pub(crate) separation_factor: f64,
    pub(crate) min_output_score: i64,
    pub(crate) use_extent: bool,
}

impl ClusterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed_separation(self, fixed_separation: i64) -> Self {
        Self {
            fixed_separation,
            ..self
        }
    }

    pub fn max_separation(self, max_separation: i64) -> Self {
        Self {
            max_separation,
            ..self
        }
    }

    pub fn separation_factor(self, separation_factor: f64) -> Self {
        Self {
            separation_factor,
            ..self
        }
    }

    pub fn min_output_score(self, min_output_score: i64) -> Self {
        Self {
            min_output_score,
            ..self
        }
    }

    /// When set, a cluster's chain is scored by its reference span
    /// (`hi - lo`) rather than its total matched length.
    pub fn use_extent(self, use_extent: bool) -> Self {
        Self { use_extent, ..self }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            fixed_separation: 5,
            max_separation: 1000,
            separation_factor: 0.05,
            min_output_score: 200,
            use_extent: false,
        }
    }
}

/// Which scoring matrix an [`crate::align::ExtendAligner`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMatrixKind {
    Nucleotide,
    Blosum45,
    Blosum62,
    Blosum80,
}

/// Configuration for [`crate::align::ExtendAligner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignerConfig {
    pub(crate) matrix: ScoringMatrixKind,
    pub(crate) break_len: i64,
    pub(crate) banding: i64,
    pub(crate) do_delta: bool,
    pub(crate) do_extend: bool,
    pub(crate) to_seq_end: bool,
    pub(crate) do_shadows: bool,
    pub(crate) max_alignment_length: i64,
}

impl AlignerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(self, matrix: ScoringMatrixKind) -> Self {
        Self { matrix, ..self }
    }

    /// Score-drop budget that terminates extension early.
    pub fn break_len(self, break_len: i64) -> Self {
        Self { break_len, ..self }
    }

    /// Hard band width around the diagonal midpoint. `0` disables banding.
    pub fn banding(self, banding: i64) -> Self {
        Self { banding, ..self }
    }

    pub fn do_delta(self, do_delta: bool) -> Self {
        Self { do_delta, ..self }
    }

    pub fn do_extend(self, do_extend: bool) -> Self {
        Self { do_extend, ..self }
    }

    pub fn to_seq_end(self, to_seq_end: bool) -> Self {
        Self { to_seq_end, ..self }
    }

    pub fn do_shadows(self, do_shadows: bool) -> Self {
        Self { do_shadows, ..self }
    }

    pub fn max_alignment_length(self, max_alignment_length: i64) -> Self {
        Self {
            max_alignment_length,
            ..self
        }
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            matrix: ScoringMatrixKind::Nucleotide,
            break_len: 200,
            banding: 0,
            do_delta: true,
            do_extend: true,
            to_seq_end: false,
            do_shadows: true,
            max_alignment_length: 10_000_000,
        }
    }
}

/// Top level match-finding configuration (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub(crate) flavor: MatchFlavor,
    pub(crate) min_len: i64,
    pub(crate) orientation: Orientation,
}

impl MatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flavor(self, flavor: MatchFlavor) -> Self {
        Self { flavor, ..self }
    }

    pub fn min_len(self, min_len: i64) -> Self {
        assert!(min_len > 0);
        Self { min_len, ..self }
    }

    pub fn orientation(self, orientation: Orientation) -> Self {
        Self {
            orientation,
            ..self
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            flavor: MatchFlavor::Mum,
            min_len: 20,
            orientation: Orientation::Both,
        }
    }
}
