use std::sync::Arc;

use mumcore::{
    find_matches, BoundedSequence, ClusterConfig, ConstructOptions, Match, MatchConfig,
    MatchClusterer, SparseSuffixArray,
};

fn index(text: &[u8]) -> SparseSuffixArray {
    let seq = Arc::new(BoundedSequence::new([text]));
    SparseSuffixArray::construct(seq, 1, ConstructOptions::new()).unwrap()
}

#[test]
fn matches_from_two_separate_regions_cluster_separately() {
    let reference = [
        b"x".repeat(5),
        b"acgtacgtacgtacgtacgt".to_vec(),
        b"x".repeat(2000),
        b"ttggccaattggccaattgg".to_vec(),
        b"x".repeat(5),
    ]
    .concat();
    let query = [
        b"acgtacgtacgtacgtacgt".to_vec(),
        b"n".repeat(50),
        b"ttggccaattggccaattgg".to_vec(),
    ]
    .concat();

    let ssa = index(&reference);
    let config = MatchConfig::new().min_len(10);
    let matches = find_matches(&ssa, &query, &config);
    assert!(!matches.is_empty());

    let clusterer = MatchClusterer::new(ClusterConfig::new().min_output_score(10).max_separation(100));
    let clusters = clusterer.cluster_each(matches);
    assert_eq!(clusters.len(), 2);
}

#[test]
fn serial_and_parallel_clustering_agree_on_cluster_count() {
    let reference = b"acgtacgtacgtacgtacgtacgtacgtacgt".to_vec();
    let ssa = index(&reference);
    let config = MatchConfig::new().min_len(8);
    let matches = find_matches(&ssa, &reference, &config);

    let cluster_config = ClusterConfig::new().min_output_score(8);
    let serial = MatchClusterer::new(cluster_config).cluster_each(matches.clone());
    let parallel = MatchClusterer::new(cluster_config).cluster_long(matches);

    let serial_matches: usize = serial.iter().map(|c| c.len()).sum();
    let parallel_matches: usize = parallel.iter().map(|c| c.len()).sum();
    assert_eq!(serial_matches, parallel_matches);
}

#[test]
fn forward_and_reverse_matches_on_the_same_diagonal_cluster_separately() {
    let forward = Match { ref_pos: 1, query_pos: 1, len: 20, reverse: false };
    let reverse = Match { ref_pos: 1, query_pos: 1, len: 20, reverse: true };

    let clusterer = MatchClusterer::new(ClusterConfig::new().min_output_score(10));
    let clusters = clusterer.cluster_each(vec![forward, reverse]);

    // same diagonal, same coordinates: without a reverse/forward split this
    // union-finds into a single, mixed-orientation cluster.
    assert_eq!(clusters.len(), 2);
    for cluster in &clusters {
        assert!(cluster.iter().all(|m| m.reverse) || cluster.iter().all(|m| !m.reverse));
    }
}

#[test]
fn a_strict_min_output_score_drops_weak_clusters() {
    let reference = b"acgtacgt".to_vec();
    let ssa = index(&reference);
    let config = MatchConfig::new().min_len(4);
    let matches = find_matches(&ssa, &reference, &config);

    let clusterer = MatchClusterer::new(ClusterConfig::new().min_output_score(1_000_000));
    let clusters = clusterer.cluster_each(matches);
    assert!(clusters.is_empty());
}
