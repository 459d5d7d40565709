//! `LCP` storage: byte-wide cells plus a sorted overflow table for values
//! `>= 255`, porting `sparseSA.cpp`'s `vec_uchar` (spec.md §3).

const OVERFLOW_MARKER: u8 = u8::MAX;

#[derive(Debug, Clone)]
pub struct LcpArray {
    cells: Vec<u8>,
    overflow: Vec<(u32, i64)>,
    overflow_sorted: bool,
}

impl LcpArray {
    pub fn new(len: usize) -> Self {
        LcpArray {
            cells: vec![0; len],
            overflow: Vec::new(),
            overflow_sorted: true,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> i64 {
        let cell = self.cells[idx];
        if cell == OVERFLOW_MARKER {
            debug_assert!(self.overflow_sorted, "LcpArray::finalize was not called");
            let pos = self
                .overflow
                .binary_search_by_key(&(idx as u32), |&(i, _)| i)
                .expect("overflow marker without matching overflow entry");
            self.overflow[pos].1
        } else {
            cell as i64
        }
    }

    pub fn set(&mut self, idx: usize, value: i64) {
        if value >= OVERFLOW_MARKER as i64 {
            self.cells[idx] = OVERFLOW_MARKER;
            self.overflow.push((idx as u32, value));
            self.overflow_sorted = false;
        } else {
            self.cells[idx] = value as u8;
        }
    }

    /// Sorts the overflow table by index for binary-search lookup. Must be
    /// called once after all `set` calls and before any `get` that might
    /// touch an overflowed cell.
    pub fn finalize(&mut self) {
        self.overflow.sort_by_key(|&(i, _)| i);
        self.overflow_sorted = true;
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn overflow(&self) -> &[(u32, i64)] {
        &self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_stay_inline() {
        let mut lcp = LcpArray::new(3);
        lcp.set(0, 0);
        lcp.set(1, 17);
        lcp.set(2, 254);
        lcp.finalize();
        assert_eq!(lcp.get(0), 0);
        assert_eq!(lcp.get(1), 17);
        assert_eq!(lcp.get(2), 254);
        assert!(lcp.overflow().is_empty());
    }

    #[test]
    fn large_values_go_to_overflow() {
        let mut lcp = LcpArray::new(3);
        lcp.set(0, 1000);
        lcp.set(1, 5);
        lcp.set(2, 255);
        lcp.finalize();
        assert_eq!(lcp.get(0), 1000);
        assert_eq!(lcp.get(1), 5);
        assert_eq!(lcp.get(2), 255);
        assert_eq!(lcp.overflow().len(), 2);
    }
}
