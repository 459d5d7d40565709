//! Union-find over 1-based match indices, in both a plain serial form and a
//! lock-free CAS-based form for parallel clustering, porting
//! `mgaps.hh`'s `UnionFind` and `dset.hpp`'s `DisjointSets`.

use std::sync::atomic::{AtomicI64, Ordering};

/// Serial, path-compressed union-find. Indices must lie in `[1, size]`;
/// `0` is never a valid element (matches `mgaps.hh`'s convention of
/// 1-indexing the match array).
#[derive(Debug, Default)]
pub struct UnionFind {
    parent: Vec<i64>,
}

impl UnionFind {
    pub fn new() -> Self {
        UnionFind { parent: Vec::new() }
    }

    /// Resets to `size` singleton sets, indexed `1..=size`.
    pub fn reset(&mut self, size: usize) {
        self.parent = (0..=size as i64).collect();
    }

    /// Returns the representative of `a`'s set, path-compressing along the
    /// way.
    pub fn find(&mut self, a: i64) -> i64 {
        let mut root = a;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = a;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    /// Unions the sets containing `a` and `b`.
    pub fn union_sets(&mut self, a: i64, b: i64) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra as usize] = rb;
        }
    }
}

/// Lock-free union-find over an atomic parent array, for the parallel
/// clustering path (`Cluster_each_long`'s `DisjointSets`). `union_sets` uses
/// compare-and-swap with path halving rather than a lock, so concurrent
/// unions from independent diagonal pairs never block each other.
pub struct DisjointSets {
    parent: Vec<AtomicI64>,
}

impl DisjointSets {
    /// Builds `size + 1` singleton sets, indexed `0..=size` (element `0`
    /// unused, kept only so indices line up with [`UnionFind`]'s 1-based
    /// convention).
    pub fn new(size: usize) -> Self {
        DisjointSets {
            parent: (0..=size as i64).map(AtomicI64::new).collect(),
        }
    }

    /// Returns the representative of `a`'s set. Performs path halving
    /// (each visited node's parent is advanced to its grandparent) instead
    /// of full path compression, since full compression under concurrent
    /// mutation would require re-walking after every CAS.
    pub fn find(&self, a: i64) -> i64 {
        let mut cur = a;
        loop {
            let parent = self.parent[cur as usize].load(Ordering::Acquire);
            if parent == cur {
                return cur;
            }
            let grandparent = self.parent[parent as usize].load(Ordering::Acquire);
            if grandparent != parent {
                // best-effort path halving; ignore the outcome, another
                // thread may have already advanced it further.
                let _ = self.parent[cur as usize].compare_exchange_weak(
                    parent,
                    grandparent,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            cur = parent;
        }
    }

    /// Unions the sets containing `a` and `b` via repeated CAS, retrying
    /// against concurrent unions until one side's root is fixed in place.
    pub fn union_sets(&self, a: i64, b: i64) {
        loop {
            let ra = self.find(a);
            let rb = self.find(b);
            if ra == rb {
                return;
            }
            // Always attach the numerically larger root under the smaller
            // one: a fixed, deterministic tie-break avoids two threads
            // creating a cycle by attaching roots to each other.
            let (from, to) = if ra > rb { (ra, rb) } else { (rb, ra) };
            if self.parent[from as usize]
                .compare_exchange(from, to, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            // Someone else updated `from`'s parent first; retry from the
            // top with the refreshed tree.
        }
    }
}
