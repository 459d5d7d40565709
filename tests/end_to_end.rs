use std::sync::Arc;

use mumcore::suffix_array::codec::IndexCodec;
use mumcore::{
    find_matches, AlignerConfig, BoundedSequence, ClusterConfig, ConstructOptions, MatchClusterer,
    MatchConfig, MatchFlavor, ScoringMatrixKind, SparseSuffixArray, SyntenyMerger,
};
use mumcore::alphabet::reverse_complement;
use mumcore::synteny::Cluster;

// Lowercase, matching `BoundedSequence::new`'s normalization: match-finding
// compares raw query bytes against the lowercased reference text directly,
// so callers are expected to hand it already-lowercase query bytes (see the
// `match_finder` unit tests, which use lowercase literals throughout).
fn pseudo_random_dna(seed: u64, len: usize) -> Vec<u8> {
    let bases = [b'a', b'c', b'g', b't'];
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            bases[(state % 4) as usize]
        })
        .collect()
}

fn align(reference: &[u8], query: &[u8]) -> Vec<mumcore::synteny::Alignment> {
    let seq = Arc::new(BoundedSequence::new([reference]));
    let ssa = SparseSuffixArray::construct(seq, 1, ConstructOptions::new()).unwrap();
    // MaxMatch (MEM) rather than the uniqueness-checking flavors: several of
    // these scenarios use short periodic or repeat-bearing sequences, where
    // a MUM's "unique in reference" requirement would otherwise drop the
    // very match the scenario is about.
    let match_config = MatchConfig::new().min_len(20).flavor(MatchFlavor::MaxMatch);
    let matches = find_matches(&ssa, query, &match_config);

    let clusterer_config = ClusterConfig::new().min_output_score(20);
    let clusters_raw = MatchClusterer::new(clusterer_config).cluster_each(matches);
    let clusters: Vec<Cluster> = clusters_raw.into_iter().map(Cluster::new).collect();

    let query_rc = reverse_complement(query);
    let merger = SyntenyMerger::new(AlignerConfig::new().matrix(ScoringMatrixKind::Nucleotide));
    merger.extend_clusters(
        clusters,
        reference,
        reference.len() as i64,
        query,
        Some(&query_rc),
        query.len() as i64,
    )
}

#[test]
fn s1_sequence_identity() {
    let sequence = pseudo_random_dna(1, 1000);
    let alignments = align(&sequence, &sequence);
    assert_eq!(alignments.len(), 1);
    let a = &alignments[0];
    assert_eq!((a.s_a, a.e_a, a.s_b, a.e_b), (1, 1000, 1, 1000));
    assert_eq!(a.errors, 0);
    assert!(a.delta.is_empty());
}

#[test]
fn s2_prefix_overlap_with_point_edits() {
    let s1 = pseudo_random_dna(100, 1000);
    let mut s2 = s1[900..1000].to_vec();
    s2.extend(pseudo_random_dna(200, 900));

    // a single base substitution at S2[25] (1-indexed): force it to differ
    // from whatever pseudo_random_dna produced there.
    let flip_idx = 24;
    s2[flip_idx] = if s2[flip_idx] == b'a' { b'c' } else { b'a' };

    // delete S2[75] (1-indexed) and S1[950] (1-indexed).
    let mut query = s2;
    query.remove(74);

    let mut reference = s1;
    reference.remove(949);

    let alignments = align(&reference, &query);
    assert_eq!(alignments.len(), 1);
    let a = &alignments[0];
    assert_eq!((a.s_a, a.e_a, a.s_b, a.e_b), (901, 999, 1, 99));
    assert!(!a.reverse);
    assert_eq!(a.errors, 3);
    assert_eq!(a.sim_errors, 3);
    assert_eq!(a.delta.len(), 2);
}

#[test]
fn s3_reverse_complement_match() {
    let unit = b"acgtacgtacgtacgt";
    let mut reference = Vec::new();
    while reference.len() < 200 {
        reference.extend_from_slice(unit);
    }
    reference.truncate(200);
    let query = reverse_complement(&reference);

    let alignments = align(&reference, &query);
    assert!(alignments.iter().any(|a| a.reverse));
}

#[test]
fn s4_three_base_insertion_into_query_inside_a_mem_chain() {
    let left = pseudo_random_dna(2, 500);
    let right = pseudo_random_dna(3, 500);
    let middle = pseudo_random_dna(4, 60);

    let mut reference = left.clone();
    reference.extend_from_slice(&middle);
    reference.extend_from_slice(&right);

    let mut query = left;
    let mut inserted_middle = middle[..30].to_vec();
    inserted_middle.extend_from_slice(b"ttt");
    inserted_middle.extend_from_slice(&middle[30..]);
    query.extend_from_slice(&inserted_middle);
    query.extend_from_slice(&right);

    let alignments = align(&reference, &query);
    assert_eq!(alignments.len(), 1);
    let a = &alignments[0];
    // the query has 3 extra bases the reference does not: an insertion
    // into the query, encoded as consecutive d < 0 tokens (distance zero
    // since the previous edit) totaling the 3-base gap; no d > 0 token
    // should appear at all.
    assert!(a.delta.iter().all(|&d| d <= 0));
    let inserted: i64 = a.delta.iter().filter(|&&d| d < 0).map(|d| d.abs()).sum();
    assert_eq!(inserted, 3);
}

#[test]
fn s5_no_match_query_yields_no_alignments() {
    let reference = pseudo_random_dna(10, 500);
    let query = pseudo_random_dna(999, 500);
    let alignments = align(&reference, &query);
    assert!(alignments.is_empty());
}

#[test]
fn s6_index_round_trips_through_save_and_load() {
    let dir = std::env::temp_dir().join(format!("mumcore-s6-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let prefix = dir.join("index");

    let sequence = pseudo_random_dna(42, 1000);
    let seq = Arc::new(BoundedSequence::new([sequence.as_slice()]));
    let original = SparseSuffixArray::construct(
        Arc::clone(&seq),
        1,
        ConstructOptions::new().kmer_table(3),
    )
    .unwrap();
    IndexCodec::save(&original, &prefix).unwrap();

    let loaded = IndexCodec::load(Arc::clone(&seq), &prefix).unwrap();
    for rank in 0..original.len() {
        assert_eq!(original.sa_at(rank), loaded.sa_at(rank));
        assert_eq!(original.lcp_at(rank), loaded.lcp_at(rank));
    }
    assert_eq!(original.kmer_depth(), loaded.kmer_depth());
    assert_eq!(original.kmer_lookup(b"acg"), loaded.kmer_lookup(b"acg"));

    let match_config = MatchConfig::new().min_len(20);
    let original_matches = find_matches(&original, &sequence, &match_config);
    let loaded_matches = find_matches(&loaded, &sequence, &match_config);
    assert_eq!(original_matches, loaded_matches);

    let _ = std::fs::remove_dir_all(&dir);
}
