//! Sibling-file binary persistence for a [`super::SparseSuffixArray`]
//! (spec.md §6). Five files share a path prefix `p`:
//!
//! - `p.aux`   fixed header: format version, `K`, `N`, `M = N/K` (rounded
//!             up), cell width, and which optional tables follow.
//! - `p.sa`    `SA`, `M` cells.
//! - `p.isa`   `ISA`, `M` cells.
//! - `p.lcp`   `LCP`: `M` bytes plus a length-prefixed overflow table.
//! - `p.child` `CHILD`, `M` `i64` cells (only if present).
//! - `p.kmer`  the k-mer table: `k` (`u32`) followed by `4^k` fixed-width
//!             `(start, end, depth)` interval entries (only if present).
//!
//! All integers are little-endian. This does not use `savefile`-style derive
//! serialization: the layout is specified byte-for-byte so a foreign reader
//! (or a future incompatible Rust type) can still parse it, and so the
//! on-disk width (`32` vs `48`-bit packed) is a deliberate, inspectable
//! choice rather than whatever happens to be in memory (DESIGN.md).

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sequence::BoundedSequence;

use super::cell::Cells;
use super::lcp::LcpArray;
use super::{construct, ConstructOptions, Interval, KmerTable, SparseSuffixArray};

const MAGIC: u32 = 0x4d_55_4d_31; // "MUM1"
const FORMAT_VERSION: u32 = 1;

const FLAG_PACKED48: u8 = 1 << 0;
const FLAG_CHILD: u8 = 1 << 1;
const FLAG_SUFFIX_LINKS: u8 = 1 << 2;
const FLAG_KMER: u8 = 1 << 3;

pub struct IndexCodec;

impl IndexCodec {
    /// Writes `ssa` to `<prefix>.aux`, `.sa`, `.isa`, `.lcp`, and (if
    /// present) `.child`.
    pub fn save(ssa: &SparseSuffixArray, prefix: &Path) -> Result<()> {
        let m = ssa.len() as u64;
        let n = ssa.sequence().len();

        let mut flags = 0u8;
        if ssa.sa.is_packed48() {
            flags |= FLAG_PACKED48;
        }
        if ssa.child.is_some() {
            flags |= FLAG_CHILD;
        }
        if ssa.has_suffix_links {
            flags |= FLAG_SUFFIX_LINKS;
        }
        if ssa.kmer.is_some() {
            flags |= FLAG_KMER;
        }

        let mut aux = Vec::new();
        aux.write_all(&MAGIC.to_le_bytes())?;
        aux.write_all(&FORMAT_VERSION.to_le_bytes())?;
        aux.write_all(&ssa.k.to_le_bytes())?;
        aux.write_all(&n.to_le_bytes())?;
        aux.write_all(&m.to_le_bytes())?;
        aux.write_all(&[flags])?;
        fs::write(sibling(prefix, "aux"), aux)?;

        fs::write(sibling(prefix, "sa"), encode_cells(&ssa.sa))?;
        fs::write(sibling(prefix, "isa"), encode_cells(&ssa.isa))?;
        fs::write(sibling(prefix, "lcp"), encode_lcp(&ssa.lcp))?;

        if let Some(child) = &ssa.child {
            let mut buf = Vec::with_capacity(child.len() * 8);
            for &v in child {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            fs::write(sibling(prefix, "child"), buf)?;
        }

        if let Some(kmer) = &ssa.kmer {
            fs::write(sibling(prefix, "kmer"), encode_kmer_table(kmer))?;
        }

        Ok(())
    }

    /// Loads a [`SparseSuffixArray`] previously written by [`Self::save`],
    /// binding it to `seq`. Fails if `seq`'s length is inconsistent with the
    /// header's `N`, or if `M` does not match `ceil(N / K)`.
    pub fn load(seq: Arc<BoundedSequence>, prefix: &Path) -> Result<SparseSuffixArray> {
        let aux = fs::read(sibling(prefix, "aux"))?;
        if aux.len() < 4 + 4 + 8 + 8 + 8 + 1 {
            return Err(Error::Construction("truncated .aux header".to_string()));
        }

        let magic = read_u32(&aux, 0);
        if magic != MAGIC {
            return Err(Error::Construction("bad index magic".to_string()));
        }
        let version = read_u32(&aux, 4);
        if version != FORMAT_VERSION {
            return Err(Error::Construction(format!(
                "unsupported index format version {version}"
            )));
        }
        let k = read_i64(&aux, 8);
        let n = read_i64(&aux, 16);
        let m = read_u64(&aux, 24) as usize;
        let flags = aux[32];

        if n != seq.len() {
            return Err(Error::Construction(
                "index N does not match the bound sequence length".to_string(),
            ));
        }
        let expected_m = ((n + k - 1) / k) as usize;
        if m != expected_m {
            return Err(Error::Construction(
                "index M is inconsistent with N / K".to_string(),
            ));
        }

        let packed48 = flags & FLAG_PACKED48 != 0;
        let has_child = flags & FLAG_CHILD != 0;
        let has_suffix_links = flags & FLAG_SUFFIX_LINKS != 0;
        let has_kmer = flags & FLAG_KMER != 0;

        let sa = decode_cells(&fs::read(sibling(prefix, "sa"))?, m, packed48)?;
        let isa = decode_cells(&fs::read(sibling(prefix, "isa"))?, m, packed48)?;
        let lcp = decode_lcp(&fs::read(sibling(prefix, "lcp"))?, m)?;

        let child = if has_child {
            let raw = fs::read(sibling(prefix, "child"))?;
            if raw.len() != m * 8 {
                return Err(Error::Construction("child table length mismatch".to_string()));
            }
            Some(
                raw.chunks_exact(8)
                    .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                    .collect(),
            )
        } else {
            None
        };

        let kmer = if has_kmer {
            Some(decode_kmer_table(&fs::read(sibling(prefix, "kmer"))?)?)
        } else {
            None
        };

        Ok(SparseSuffixArray {
            seq,
            k,
            sa,
            isa,
            lcp,
            child,
            kmer,
            has_suffix_links,
        })
    }
}

fn sibling(prefix: &Path, extension: &str) -> std::path::PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(".");
    s.push(extension);
    s.into()
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn read_i64(buf: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

fn encode_cells(cells: &Cells) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cells.len() * 8);
    for i in 0..cells.len() {
        buf.extend_from_slice(&cells.get(i).to_le_bytes());
    }
    buf
}

fn decode_cells(raw: &[u8], m: usize, packed48: bool) -> Result<Cells> {
    if raw.len() != m * 8 {
        return Err(Error::Construction("cell array length mismatch".to_string()));
    }
    let mut cells = if packed48 {
        Cells::new_packed48(m)
    } else {
        Cells::new_small(m)
    };
    for (i, chunk) in raw.chunks_exact(8).enumerate() {
        cells.set(i, i64::from_le_bytes(chunk.try_into().unwrap()));
    }
    Ok(cells)
}

fn encode_lcp(lcp: &LcpArray) -> Vec<u8> {
    let mut buf = Vec::with_capacity(lcp.len() + 4 + lcp.overflow().len() * 12);
    buf.extend_from_slice(lcp.cells());
    buf.extend_from_slice(&(lcp.overflow().len() as u32).to_le_bytes());
    for &(idx, value) in lcp.overflow() {
        buf.extend_from_slice(&idx.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

fn decode_lcp(raw: &[u8], m: usize) -> Result<LcpArray> {
    if raw.len() < m + 4 {
        return Err(Error::Construction("truncated lcp file".to_string()));
    }
    let mut lcp = LcpArray::new(m);
    for (i, &b) in raw[..m].iter().enumerate() {
        if b == u8::MAX {
            continue;
        }
        lcp.set(i, b as i64);
    }
    let overflow_count = read_u32(raw, m) as usize;
    let mut offset = m + 4;
    for _ in 0..overflow_count {
        if offset + 12 > raw.len() {
            return Err(Error::Construction("truncated lcp overflow table".to_string()));
        }
        let idx = read_u32(raw, offset) as usize;
        let value = read_i64(raw, offset + 4);
        lcp.set(idx, value);
        offset += 12;
    }
    lcp.finalize();
    Ok(lcp)
}

fn encode_kmer_table(table: &KmerTable) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + table.intervals.len() * 24);
    buf.extend_from_slice(&(table.k as u32).to_le_bytes());
    for iv in &table.intervals {
        buf.extend_from_slice(&(iv.start as u64).to_le_bytes());
        buf.extend_from_slice(&(iv.end as u64).to_le_bytes());
        buf.extend_from_slice(&iv.depth.to_le_bytes());
    }
    buf
}

fn decode_kmer_table(raw: &[u8]) -> Result<KmerTable> {
    if raw.len() < 4 {
        return Err(Error::Construction("truncated kmer table header".to_string()));
    }
    let k = read_u32(raw, 0) as usize;
    let table_size = construct::KMER_ALPHABET_SIZE.pow(k as u32);
    if raw.len() != 4 + table_size * 24 {
        return Err(Error::Construction("kmer table length mismatch".to_string()));
    }
    let mut intervals = Vec::with_capacity(table_size);
    let mut offset = 4;
    for _ in 0..table_size {
        let start = read_u64(raw, offset) as usize;
        let end = read_u64(raw, offset + 8) as usize;
        let depth = read_i64(raw, offset + 16);
        intervals.push(Interval { start, end, depth });
        offset += 24;
    }
    Ok(KmerTable { k, intervals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile_free_tests::temp_prefix;

    mod tempfile_free_tests {
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub fn temp_prefix(name: &str) -> PathBuf {
            let id = COUNTER.fetch_add(1, Ordering::Relaxed);
            std::env::temp_dir().join(format!("mumcore-codec-test-{name}-{id}"))
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let seq = Arc::new(BoundedSequence::new([b"gattacagattaca".as_slice()]));
        let ssa = SparseSuffixArray::construct(Arc::clone(&seq), 1, ConstructOptions::new().child_table(false))
            .unwrap();

        let prefix = temp_prefix("roundtrip");
        IndexCodec::save(&ssa, &prefix).unwrap();
        let loaded = IndexCodec::load(Arc::clone(&seq), &prefix).unwrap();

        assert_eq!(loaded.len(), ssa.len());
        for rank in 0..ssa.len() {
            assert_eq!(loaded.sa_at(rank), ssa.sa_at(rank));
            assert_eq!(loaded.lcp_at(rank), ssa.lcp_at(rank));
        }

        for ext in ["aux", "sa", "isa", "lcp"] {
            let _ = std::fs::remove_file(sibling(&prefix, ext));
        }
    }

    #[test]
    fn round_trips_a_kmer_table() {
        let seq = Arc::new(BoundedSequence::new([b"acgtacgtacgtacgt".as_slice()]));
        let ssa = SparseSuffixArray::construct(
            Arc::clone(&seq),
            1,
            ConstructOptions::new().kmer_table(2),
        )
        .unwrap();

        let prefix = temp_prefix("kmer");
        IndexCodec::save(&ssa, &prefix).unwrap();
        let loaded = IndexCodec::load(Arc::clone(&seq), &prefix).unwrap();

        assert!(loaded.has_kmer_table());
        assert_eq!(loaded.kmer_depth(), ssa.kmer_depth());
        for a in [b'a', b'c', b'g', b't'] {
            for b in [b'a', b'c', b'g', b't'] {
                let kmer = [a, b];
                assert_eq!(ssa.kmer_lookup(&kmer), loaded.kmer_lookup(&kmer));
            }
        }

        for ext in ["aux", "sa", "isa", "lcp", "child", "kmer"] {
            let _ = std::fs::remove_file(sibling(&prefix, ext));
        }
    }

    #[test]
    fn rejects_mismatched_sequence_length() {
        let seq = Arc::new(BoundedSequence::new([b"gattaca".as_slice()]));
        let ssa = SparseSuffixArray::construct(Arc::clone(&seq), 1, ConstructOptions::new()).unwrap();

        let prefix = temp_prefix("mismatch");
        IndexCodec::save(&ssa, &prefix).unwrap();

        let other = Arc::new(BoundedSequence::new([b"different".as_slice()]));
        let result = IndexCodec::load(other, &prefix);
        assert!(result.is_err());

        for ext in ["aux", "sa", "isa", "lcp"] {
            let _ = std::fs::remove_file(sibling(&prefix, ext));
        }
    }
}
