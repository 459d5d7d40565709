//! Lock-free skip list set supporting concurrent `insert`/`contains` but no
//! removal (spec.md §4/§9). Ports `mt_skip_list::set`: atomic tower
//! pointers, CAS-based insertion that re-walks forward on a stale pointer,
//! wait-free `find`, and the same hand-rolled xorshift64 RNG
//! (`imp::xor_random`) and height distribution (`random_height<Random, 4>`)
//! the original uses instead of a general-purpose RNG crate.
//!
//! `erase` is declared in `set.hpp` but its body is empty in this
//! retrieval; rather than guess at semantics, no `remove` method is
//! exposed here at all (DESIGN.md Open Question 1).

use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// `height_bound<4>::value` in `common.hpp`.
const HEIGHT_UPPER_BOUND: usize = 32;

struct XorRandom {
    state: Cell<u64>,
}

impl XorRandom {
    fn seeded(seed: u64) -> Self {
        // xor64 warm-up, matching `xor_random(seed, n=10)`.
        let rng = XorRandom {
            state: Cell::new(if seed == 0 { 88172645463325252u64 } else { seed }),
        };
        for _ in 0..10 {
            rng.next();
        }
        rng
    }

    fn next(&self) -> u64 {
        let mut y = self.state.get();
        y ^= y << 13;
        y ^= y >> 7;
        y ^= y << 17;
        self.state.set(y);
        y
    }
}

thread_local! {
    static THREAD_RNG: XorRandom = {
        use std::hash::{Hash, Hasher};
        use std::time::{SystemTime, UNIX_EPOCH};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos().hash(&mut hasher);
        XorRandom::seeded(std::hash::Hasher::finish(&hasher))
    };
}

/// `random_height<Random, 4>::gen`: `(ctz(x) >> 1) + 1`, capped at
/// `HEIGHT_UPPER_BOUND`.
fn random_height() -> usize {
    let x = THREAD_RNG.with(|rng| rng.next());
    let height = if x == 0 {
        4 * 8
    } else {
        ((x.trailing_zeros() as usize) >> 1) + 1
    };
    height.min(HEIGHT_UPPER_BOUND)
}

struct Node<K> {
    key: K,
    tower: Vec<AtomicPtr<Node<K>>>,
}

impl<K> Node<K> {
    fn new(key: K, height: usize) -> *mut Node<K> {
        let tower = (0..height).map(|_| AtomicPtr::new(ptr::null_mut())).collect();
        Box::into_raw(Box::new(Node { key, tower }))
    }
}

/// Where a level's forward pointer to insert at came from: the set's
/// fixed head array, or a tower slot belonging to an existing node.
enum Slot<K> {
    Head(usize),
    Tower(*mut Node<K>, usize),
}

impl<K> Slot<K> {
    fn compare_exchange(
        &self,
        heads: &[AtomicPtr<Node<K>>],
        current: *mut Node<K>,
        new: *mut Node<K>,
    ) -> Result<*mut Node<K>, *mut Node<K>> {
        match *self {
            Slot::Head(i) => {
                heads[i].compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            }
            Slot::Tower(node, i) => unsafe {
                (*node).tower[i].compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            },
        }
    }
}

/// Lock-free set of `K`. `insert` and `contains` are safe to call
/// concurrently from many threads; there is no concurrent-safe removal.
pub struct SkipListSet<K: Ord> {
    heads: Vec<AtomicPtr<Node<K>>>,
    max_height: AtomicUsize,
}

impl<K: Ord> SkipListSet<K> {
    pub fn new() -> Self {
        SkipListSet {
            heads: (0..HEIGHT_UPPER_BOUND).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
            max_height: AtomicUsize::new(1),
        }
    }

    /// Wait-free membership test, porting `find_node`.
    pub fn contains(&self, key: &K) -> bool {
        !self.find_node(key).is_null()
    }

    fn find_node(&self, key: &K) -> *mut Node<K> {
        let max_height = self.max_height.load(Ordering::Acquire);
        let mut i = max_height as isize - 1;
        let mut nnode: *mut Node<K> = ptr::null_mut();

        while i >= 0 {
            nnode = self.heads[i as usize].load(Ordering::Acquire);
            if !nnode.is_null() && unsafe { &(*nnode).key } < key {
                break;
            }
            i -= 1;
        }

        let mut cnode = nnode;
        while i >= 0 {
            nnode = unsafe { (*cnode).tower[i as usize].load(Ordering::Acquire) };
            while !nnode.is_null() && unsafe { &(*nnode).key } < key {
                cnode = nnode;
                nnode = unsafe { (*cnode).tower[i as usize].load(Ordering::Acquire) };
            }
            i -= 1;
        }

        if !nnode.is_null() && unsafe { &(*nnode).key } == key {
            nnode
        } else {
            ptr::null_mut()
        }
    }

    /// Records, for every level below `max_height`, the slot the new
    /// node's predecessor pointer would need to be CAS'd through, and the
    /// value observed there. Mirrors `find_node_path`.
    fn find_node_path(&self, key: &K) -> (*mut Node<K>, Vec<(Slot<K>, *mut Node<K>)>) {
        let max_height = self.max_height.load(Ordering::Acquire);
        let mut path: Vec<(Slot<K>, *mut Node<K>)> = Vec::with_capacity(max_height);
        for _ in 0..max_height {
            path.push((Slot::Head(0), ptr::null_mut()));
        }

        let mut i = max_height as isize - 1;
        let mut nnode: *mut Node<K> = ptr::null_mut();

        while i >= 0 {
            nnode = self.heads[i as usize].load(Ordering::Acquire);
            if !nnode.is_null() && unsafe { &(*nnode).key } < key {
                break;
            }
            path[i as usize] = (Slot::Head(i as usize), nnode);
            i -= 1;
        }

        let mut cnode = nnode;
        while i >= 0 {
            let level = i as usize;
            nnode = unsafe { (*cnode).tower[level].load(Ordering::Acquire) };
            while !nnode.is_null() && unsafe { &(*nnode).key } < key {
                cnode = nnode;
                nnode = unsafe { (*cnode).tower[level].load(Ordering::Acquire) };
            }
            path[level] = (Slot::Tower(cnode, level), nnode);
            i -= 1;
        }

        let found = if !nnode.is_null() && unsafe { &(*nnode).key } == key {
            nnode
        } else {
            ptr::null_mut()
        };
        (found, path)
    }

    /// Inserts `key`, returning `true` if it was newly added and `false`
    /// if an equal key was already present. Lock-free: a failed CAS either
    /// advances the retry target one node forward (the slot ahead of us
    /// was filled by a concurrent insert with a smaller key) or updates
    /// the new node's own forward pointer and retries the same slot (the
    /// concurrent insert landed after us), exactly mirroring `do_insert`'s
    /// three-way branch on the CAS's observed value.
    pub fn insert(&self, key: K) -> bool {
        let (existing, mut path) = self.find_node_path(&key);
        if !existing.is_null() {
            return false;
        }

        let height = random_height();
        self.max_height.fetch_max(height, Ordering::AcqRel);
        while path.len() < height {
            let level = path.len();
            path.push((Slot::Head(level), self.heads[level].load(Ordering::Acquire)));
        }

        let node_ptr = Node::new(key, height);

        for level in 0..height {
            let (mut target, initial_val) = (
                std::mem::replace(&mut path[level].0, Slot::Head(0)),
                path[level].1,
            );
            let mut oval = initial_val;
            unsafe {
                (*node_ptr).tower[level].store(oval, Ordering::Relaxed);
            }
            let mut cval = oval;
            loop {
                match target.compare_exchange(&self.heads, cval, node_ptr) {
                    Ok(_) => break,
                    Err(actual) => {
                        cval = actual;
                        let node_key_less = |a: *mut Node<K>| unsafe { (*a).key < (*node_ptr).key };
                        if !cval.is_null() && node_key_less(cval) {
                            // the slot now points past a node smaller than
                            // ours; retry one node forward.
                            target = Slot::Tower(cval, level);
                            cval = oval;
                        } else if cval.is_null() || unsafe { (*node_ptr).key < (*cval).key } {
                            // our node belongs before cval; point to it and
                            // retry the same slot with the refreshed value.
                            unsafe {
                                (*node_ptr).tower[level].store(cval, Ordering::Relaxed);
                            }
                            oval = cval;
                        } else {
                            // equal key: another thread inserted it first.
                            unsafe {
                                drop(Box::from_raw(node_ptr));
                            }
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

impl<K: Ord> Default for SkipListSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> Drop for SkipListSet<K> {
    fn drop(&mut self) {
        let mut cur = self.heads[0].load(Ordering::Relaxed);
        while !cur.is_null() {
            let next = unsafe { (*cur).tower[0].load(Ordering::Relaxed) };
            unsafe {
                drop(Box::from_raw(cur));
            }
            cur = next;
        }
    }
}

unsafe impl<K: Ord + Send> Send for SkipListSet<K> {}
unsafe impl<K: Ord + Send + Sync> Sync for SkipListSet<K> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn insert_then_contains_round_trips() {
        let set = SkipListSet::new();
        assert!(set.insert(42));
        assert!(set.contains(&42));
        assert!(!set.contains(&7));
    }

    #[test]
    fn duplicate_insert_reports_false() {
        let set = SkipListSet::new();
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
    }

    #[test]
    fn concurrent_inserts_are_all_visible() {
        let set = Arc::new(SkipListSet::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let set = Arc::clone(&set);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    set.insert(t * 1000 + i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        for t in 0..8 {
            for i in 0..200 {
                assert!(set.contains(&(t * 1000 + i)));
            }
        }
    }
}
