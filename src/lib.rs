//! `mumcore`: an indexed maximal-match engine and cluster-and-extend
//! aligner for DNA and protein sequences, in the mould of MUMmer's
//! `nucmer`/`promer` pipeline.
//!
//! A [`suffix_array::SparseSuffixArray`] built over a
//! [`sequence::BoundedSequence`] finds maximal matches
//! ([`match_finder`]) between a reference and a query; matches are
//! grouped into diagonal-proximity clusters and chain-selected
//! ([`cluster`]); clusters are gap-filled into full alignments
//! ([`align`], [`synteny`]). [`pipeline`] and [`skiplist`] are the
//! concurrency primitives the rest of the crate is built to run on top
//! of: a cooperative bounded work queue and a lock-free membership set.

pub mod align;
pub mod alphabet;
pub mod cluster;
pub mod config;
pub mod error;
pub mod match_finder;
pub mod pipeline;
pub mod sequence;
pub mod skiplist;
pub mod suffix_array;
pub mod synteny;

pub use align::{ExtendAligner, ExtensionResult};
pub use cluster::{ExtMatch, MatchClusterer};
pub use config::{AlignerConfig, ClusterConfig, MatchConfig, MatchFlavor, Orientation, ScoringMatrixKind};
pub use error::{Error, Result};
pub use match_finder::{find_matches, find_mams, find_mems, find_mums, Match};
pub use pipeline::{CooperativePool, QueryPipeline};
pub use sequence::BoundedSequence;
pub use skiplist::SkipListSet;
pub use suffix_array::{ConstructOptions, Interval, SparseSuffixArray};
pub use synteny::{Alignment, Cluster, SyntenyMerger};
