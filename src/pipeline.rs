//! Cooperative producer/consumer pipeline: a bounded ring buffer fed by a
//! fixed set of worker threads, each of which consumes queued items and,
//! when the queue runs low, temporarily becomes one of a bounded number of
//! producers (spec.md §4.7/§5/§9). Grounds on `cooperative_pool2.hpp`'s
//! `pool_base`/`producer_pool`/`consumer_pool` by contract: the role-flip
//! rule (consume first, become a producer only below half capacity, bounded
//! to `max_producers` concurrent producers, exponential back-off once every
//! worker is idle) is preserved; the CRTP `produce`/`consume` methods become
//! a plain trait (spec.md's redesign guidance), and the original's
//! lock-free `circular_buffer` FIFOs become a `Mutex<VecDeque<T>>` pair of
//! condvars, which is simpler to review without running it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// Implemented by whatever drives a [`QueryPipeline`]: `produce` supplies
/// new work items (one call site per concurrent producer slot, numbered
/// `producer_id`), `consume` processes a dequeued item.
pub trait CooperativePool<T: Send>: Sync {
    /// Returns the next item for producer slot `producer_id`, or `None`
    /// once that slot has nothing left to produce.
    fn produce(&self, producer_id: u32) -> Option<T>;

    /// Processes one dequeued item.
    fn consume(&self, item: T);
}

/// Bounded queue plus the role-flip bookkeeping every worker thread shares.
pub struct QueryPipeline<T> {
    queue: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    active_producers: AtomicU32,
    max_producers: u32,
    producers_done: AtomicU32,
    closed: AtomicBool,
}

impl<T: Send> QueryPipeline<T> {
    pub fn new(capacity: usize, max_producers: u32) -> Self {
        QueryPipeline {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
            active_producers: AtomicU32::new(0),
            max_producers: max_producers.max(1),
            producers_done: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Runs `pool` to completion across `workers` threads: every thread
    /// tries to consume first, and only attempts to become a producer (up
    /// to `max_producers` at a time) when the queue has dropped below half
    /// capacity. Returns once every producer has reported exhaustion and
    /// every queued item has been consumed.
    pub fn run<P: CooperativePool<T>>(&self, pool: &P, workers: u32) {
        thread::scope(|scope| {
            for worker_id in 0..workers.max(1) {
                scope.spawn(move || self.worker_loop(pool, worker_id % self.max_producers));
            }
        });
    }

    fn worker_loop<P: CooperativePool<T>>(&self, pool: &P, producer_id: u32) {
        let mut idle_iterations = 0u32;
        loop {
            if let Some(item) = self.try_dequeue() {
                pool.consume(item);
                idle_iterations = 0;
                continue;
            }
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            if self.try_become_producer() {
                self.produce_until_exhausted(pool, producer_id);
                idle_iterations = 0;
            } else {
                Self::back_off(idle_iterations);
                idle_iterations += 1;
            }
        }
    }

    fn try_dequeue(&self) -> Option<T> {
        let mut queue = self.queue.lock().unwrap();
        let item = queue.pop_front();
        if item.is_some() {
            drop(queue);
            self.not_full.notify_one();
        }
        item
    }

    fn queue_below_half(&self) -> bool {
        let queue = self.queue.lock().unwrap();
        queue.len() < self.capacity / 2
    }

    fn try_become_producer(&self) -> bool {
        if !self.queue_below_half() {
            return false;
        }
        loop {
            let current = self.active_producers.load(Ordering::Acquire);
            if current >= self.max_producers {
                return false;
            }
            if self
                .active_producers
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn produce_until_exhausted<P: CooperativePool<T>>(&self, pool: &P, producer_id: u32) {
        loop {
            match pool.produce(producer_id) {
                Some(item) => {
                    let mut queue = self.queue.lock().unwrap();
                    while queue.len() >= self.capacity && !self.closed.load(Ordering::Acquire) {
                        queue = self.not_full.wait(queue).unwrap();
                    }
                    queue.push_back(item);
                    drop(queue);
                    self.not_empty.notify_one();
                }
                None => break,
            }
        }
        self.active_producers.fetch_sub(1, Ordering::AcqRel);
        let done = self.producers_done.fetch_add(1, Ordering::AcqRel) + 1;
        if done >= self.max_producers {
            self.closed.store(true, Ordering::Release);
            self.not_empty.notify_all();
            self.not_full.notify_all();
        }
    }

    /// No delay for the first 16 idle spins, then exponential back-off
    /// capped at one second, mirroring `pool_base::delay`.
    fn back_off(iteration: u32) {
        if iteration < 16 {
            return;
        }
        let shift = (iteration - 16).min(10);
        thread::sleep(Duration::from_millis(1u64 << shift));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex as StdMutex;

    struct CountingPool {
        remaining: AtomicI64,
        consumed: StdMutex<Vec<i64>>,
    }

    impl CooperativePool<i64> for CountingPool {
        fn produce(&self, _producer_id: u32) -> Option<i64> {
            let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
            if prev > 0 {
                Some(prev)
            } else {
                None
            }
        }

        fn consume(&self, item: i64) {
            self.consumed.lock().unwrap().push(item);
        }
    }

    #[test]
    fn every_produced_item_is_consumed_exactly_once() {
        let pool = CountingPool {
            remaining: AtomicI64::new(500),
            consumed: StdMutex::new(Vec::new()),
        };
        let pipeline = QueryPipeline::new(16, 4);
        pipeline.run(&pool, 8);

        let mut consumed = pool.consumed.into_inner().unwrap();
        consumed.sort_unstable();
        consumed.dedup();
        assert_eq!(consumed.len(), 500);
    }

    #[test]
    fn single_worker_still_drains_the_queue() {
        let pool = CountingPool {
            remaining: AtomicI64::new(20),
            consumed: StdMutex::new(Vec::new()),
        };
        let pipeline = QueryPipeline::new(4, 1);
        pipeline.run(&pool, 1);
        assert_eq!(pool.consumed.into_inner().unwrap().len(), 20);
    }
}
