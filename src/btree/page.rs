//! One B-tree page, decoded for one of the three historical generations.
//!
//! The three historical layouts are expressed as a single struct
//! parameterised by a small [`BtreeVersion`] tag rather than mirrored as
//! separate inheriting types.

use std::cell::RefCell;
use std::io::Cursor as IoCursor;

use crate::error::{Error, Result};
use crate::reader::ByteRead;

/// Which of the three historical page layouts this page was decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtreeVersion {
    V15,
    V16,
    V20,
}

impl BtreeVersion {
    /// Scan the fixed banner offsets at the start of page 0.
    pub fn detect(page0: &[u8]) -> Result<Self> {
        const BANNER_15: &[u8] = b"B-tree v 1.5 (C) Pol 1990";
        const BANNER_16: &[u8] = b"B-tree v 1.6 (C) Pol 1990";
        const BANNER_20: &[u8] = b"B-tree v2";
        if page0.len() >= 13 + BANNER_15.len() && &page0[13..13 + BANNER_15.len()] == BANNER_15 {
            Ok(BtreeVersion::V15)
        } else if page0.len() >= 19 + BANNER_16.len()
            && &page0[19..19 + BANNER_16.len()] == BANNER_16
        {
            Ok(BtreeVersion::V16)
        } else if page0.len() >= 19 + BANNER_20.len()
            && &page0[19..19 + BANNER_20.len()] == BANNER_20
        {
            Ok(BtreeVersion::V20)
        } else {
            Err(Error::UnknownVersion(
                "no recognised B-tree banner at offset 13 or 19".into(),
            ))
        }
    }
}

/// Decoded header of page 0.
#[derive(Debug, Clone, Copy)]
pub struct BtreeHeader {
    pub version: BtreeVersion,
    pub first_free_page: u64,
    pub page_size: u64,
    pub first_index_page: u64,
    pub record_count: u64,
    pub page_count: u64,
}

impl BtreeHeader {
    pub fn decode(version: BtreeVersion, page0: &[u8]) -> Result<Self> {
        let mut c = IoCursor::new(page0);
        let (first_free_page, page_size, first_index_page, record_count, page_count) =
            match version {
                BtreeVersion::V15 => {
                    let ff = u64::from(c.read_u16_le()?);
                    let ps = u64::from(c.read_u16_le()?);
                    let fi = u64::from(c.read_u16_le()?);
                    let rc = u64::from(c.read_u32_le()?);
                    let pc = u64::from(c.read_u16_le()?);
                    (ff, ps, fi, rc, pc)
                }
                BtreeVersion::V16 | BtreeVersion::V20 => {
                    let ff = u64::from(c.read_u32_le()?);
                    let ps = u64::from(c.read_u16_le()?);
                    let fi = u64::from(c.read_u32_le()?);
                    let rc = u64::from(c.read_u32_le()?);
                    let pc = u64::from(c.read_u32_le()?);
                    (ff, ps, fi, rc, pc)
                }
            };
        Ok(BtreeHeader {
            version,
            first_free_page,
            page_size,
            first_index_page,
            record_count,
            page_count,
        })
    }
}

/// One decoded entry: either an index entry (child page number) or a leaf
/// entry (front-compression indent), sharing a record offset into the page.
#[derive(Debug, Clone, Copy)]
struct Entry {
    page_or_indent: u64,
    rec_ofs: usize,
}

/// The outcome of a page-local lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Recurse,
    Equal,
    Less,
    Greater,
}

/// A single decoded B-tree page (either the tree header is not represented
/// here -- see [`BtreeHeader`] -- or a regular index/leaf page).
pub struct Page {
    version: BtreeVersion,
    preceding: u64,
    raw: Vec<u8>,
    entries: Vec<Entry>,
    keys: RefCell<Vec<Option<Vec<u8>>>>,
}

impl Page {
    pub fn decode(version: BtreeVersion, raw: Vec<u8>) -> Result<Self> {
        let mut c = IoCursor::new(raw.as_slice());
        let preceding = match version {
            BtreeVersion::V15 => u64::from(c.read_u16_le()?),
            BtreeVersion::V16 | BtreeVersion::V20 => u64::from(c.read_u32_le()?),
        };
        let count = c.read_u16_le()? as usize;
        let is_leaf = preceding == 0;

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = if is_leaf {
                match version {
                    BtreeVersion::V15 => {
                        let indent = c.read_u8()?;
                        let _unused = c.read_u8()?;
                        let rec_ofs = c.read_u16_le()? as usize + 1;
                        Entry {
                            page_or_indent: u64::from(indent),
                            rec_ofs,
                        }
                    }
                    BtreeVersion::V16 => {
                        let indent = c.read_u8()?;
                        let _unused = c.read_u8()?;
                        let _unused1 = c.read_u16_le()?;
                        let rec_ofs = c.read_u16_le()? as usize + 1;
                        Entry {
                            page_or_indent: u64::from(indent),
                            rec_ofs,
                        }
                    }
                    BtreeVersion::V20 => {
                        let indent = c.read_u16_le()?;
                        let _unused = c.read_u16_le()?;
                        let rec_ofs = c.read_u16_le()? as usize;
                        Entry {
                            page_or_indent: u64::from(indent),
                            rec_ofs,
                        }
                    }
                }
            } else {
                match version {
                    BtreeVersion::V15 => {
                        let pagenr = c.read_u16_le()?;
                        let rec_ofs = c.read_u16_le()? as usize + 1;
                        Entry {
                            page_or_indent: u64::from(pagenr),
                            rec_ofs,
                        }
                    }
                    BtreeVersion::V16 => {
                        let pagenr = c.read_u32_le()?;
                        let rec_ofs = c.read_u16_le()? as usize + 1;
                        Entry {
                            page_or_indent: u64::from(pagenr),
                            rec_ofs,
                        }
                    }
                    BtreeVersion::V20 => {
                        let pagenr = c.read_u32_le()?;
                        let rec_ofs = c.read_u16_le()? as usize;
                        Entry {
                            page_or_indent: u64::from(pagenr),
                            rec_ofs,
                        }
                    }
                }
            };
            entries.push(entry);
        }

        let n = entries.len();
        Ok(Page {
            version,
            preceding,
            raw,
            entries,
            keys: RefCell::new(vec![None; n]),
        })
    }

    pub fn version(&self) -> BtreeVersion {
        self.version
    }

    pub fn is_leaf(&self) -> bool {
        self.preceding == 0
    }

    pub fn is_index(&self) -> bool {
        !self.is_leaf()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Child page at position `i`, `-1` meaning the preceding pointer.
    pub fn getpage(&self, i: i64) -> Result<u64> {
        if self.is_leaf() {
            return Err(Error::OutOfBounds("getpage called on a leaf page".into()));
        }
        if i < 0 {
            return Ok(self.preceding);
        }
        self.entries
            .get(i as usize)
            .map(|e| e.page_or_indent)
            .ok_or_else(|| Error::OutOfBounds(format!("page index {i} too large")))
    }

    fn record_at(&self, rec_ofs: usize) -> Result<(&[u8], &[u8])> {
        let buf = self
            .raw
            .get(rec_ofs..)
            .ok_or_else(|| Error::CorruptTree(format!("record offset {rec_ofs} past page end")))?;
        let mut c = IoCursor::new(buf);
        let key_len = c.read_u16_le()? as usize;
        let key_start = rec_ofs + 2;
        let key_end = key_start
            .checked_add(key_len)
            .ok_or_else(|| Error::CorruptTree("key length overflow".into()))?;
        let key = self
            .raw
            .get(key_start..key_end)
            .ok_or_else(|| Error::CorruptTree("key bytes past page end".into()))?;
        let mut c2 = IoCursor::new(
            self.raw
                .get(key_end..)
                .ok_or_else(|| Error::CorruptTree("value length past page end".into()))?,
        );
        let val_len = c2.read_u16_le()? as usize;
        let val_start = key_end + 2;
        let val_end = val_start
            .checked_add(val_len)
            .ok_or_else(|| Error::CorruptTree("value length overflow".into()))?;
        let val = self
            .raw
            .get(val_start..val_end)
            .ok_or_else(|| Error::CorruptTree("value bytes past page end".into()))?;
        Ok((key, val))
    }

    fn ensure_keys_upto(&self, i: usize) -> Result<()> {
        let cached = self.keys.borrow().len();
        debug_assert_eq!(cached, self.entries.len());
        let start = {
            let keys = self.keys.borrow();
            keys.iter().take(i + 1).take_while(|k| k.is_some()).count()
        };
        for idx in start..=i {
            let entry = self.entries[idx];
            let (key_bytes, _) = self.record_at(entry.rec_ofs)?;
            let key = if self.is_leaf() {
                let indent = entry.page_or_indent as usize;
                let prev: Vec<u8> = if idx == 0 {
                    Vec::new()
                } else {
                    self.keys.borrow()[idx - 1]
                        .clone()
                        .expect("previous leaf key must already be cached")
                };
                let mut k = prev[..indent.min(prev.len())].to_vec();
                k.extend_from_slice(key_bytes);
                k
            } else {
                key_bytes.to_vec()
            };
            self.keys.borrow_mut()[idx] = Some(key);
        }
        Ok(())
    }

    pub fn getkey(&self, i: usize) -> Result<Vec<u8>> {
        if i >= self.entries.len() {
            return Err(Error::OutOfBounds(format!("key index {i} out of range")));
        }
        self.ensure_keys_upto(i)?;
        Ok(self.keys.borrow()[i].clone().unwrap())
    }

    pub fn getval(&self, i: usize) -> Result<Vec<u8>> {
        let entry = *self
            .entries
            .get(i)
            .ok_or_else(|| Error::OutOfBounds(format!("value index {i} out of range")))?;
        let (_, val) = self.record_at(entry.rec_ofs)?;
        Ok(val.to_vec())
    }

    /// Binary search the largest `i` with `key(i) <= target`.
    pub fn find(&self, target: &[u8]) -> Result<(Action, i64)> {
        let n = self.entries.len();
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let k = self.getkey(mid)?;
            if k.as_slice() <= target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            return if self.is_index() {
                Ok((Action::Recurse, -1))
            } else {
                Ok((Action::Greater, 0))
            };
        }
        let i = lo - 1;
        let k = self.getkey(i)?;
        if k.as_slice() == target {
            Ok((Action::Equal, i as i64))
        } else if self.is_index() {
            Ok((Action::Recurse, i as i64))
        } else {
            Ok((Action::Less, i as i64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &[u8], val: &[u8]) -> Vec<u8> {
        let mut r = Vec::new();
        r.extend((key.len() as u16).to_le_bytes());
        r.extend_from_slice(key);
        r.extend((val.len() as u16).to_le_bytes());
        r.extend_from_slice(val);
        r
    }

    /// A v2.0 index page with preceding=122, subpages 123/125/127 and keys
    /// `Nabcde`/`Nbcdef`/`Ncdef`, padded out to 2048 bytes.
    fn s1_index_page() -> Page {
        let mut raw = Vec::new();
        raw.extend(122u32.to_le_bytes()); // preceding
        raw.extend(3u16.to_le_bytes()); // count

        let recs = [record(b"Nabcde", b""), record(b"Nbcdef", b""), record(b"Ncdef", b"")];
        let mut ofs = 24usize;
        let mut rec_ofs = Vec::new();
        for r in &recs {
            rec_ofs.push(ofs);
            ofs += r.len();
        }
        for (pagenr, ro) in [123u32, 125, 127].into_iter().zip(&rec_ofs) {
            raw.extend(pagenr.to_le_bytes());
            raw.extend((*ro as u16).to_le_bytes());
        }
        for r in &recs {
            raw.extend_from_slice(r);
        }
        raw.resize(2048, 0);
        Page::decode(BtreeVersion::V20, raw).unwrap()
    }

    #[test]
    fn s1_index_page_lookup() {
        let page = s1_index_page();
        assert_eq!(page.preceding, 122);
        assert_eq!(page.getpage(-1).unwrap(), 122);
        assert_eq!(page.getpage(0).unwrap(), 123);
        assert_eq!(page.getpage(1).unwrap(), 125);
        assert_eq!(page.getpage(2).unwrap(), 127);

        assert_eq!(page.find(b"N").unwrap(), (Action::Recurse, -1));
        assert_eq!(page.find(b"Nabcde").unwrap(), (Action::Equal, 0));
        assert_eq!(page.find(b"Nbzzzz").unwrap(), (Action::Recurse, 1));
        assert_eq!(page.find(b"Nzzzz").unwrap(), (Action::Recurse, 2));
    }

    /// The same three logical keys as a leaf page, front-compressed with
    /// indents 0/1/1.
    fn s2_leaf_page() -> Page {
        let mut raw = Vec::new();
        raw.extend(0u32.to_le_bytes()); // preceding == 0 => leaf
        raw.extend(3u16.to_le_bytes()); // count

        let recs = [record(b"Nabcde", b""), record(b"bcdef", b""), record(b"cdef", b"")];
        let mut ofs = 24usize;
        let mut rec_ofs = Vec::new();
        for r in &recs {
            rec_ofs.push(ofs);
            ofs += r.len();
        }
        for (indent, ro) in [0u16, 1, 1].into_iter().zip(&rec_ofs) {
            raw.extend(indent.to_le_bytes());
            raw.extend(0u16.to_le_bytes()); // unused
            raw.extend((*ro as u16).to_le_bytes());
        }
        for r in &recs {
            raw.extend_from_slice(r);
        }
        Page::decode(BtreeVersion::V20, raw).unwrap()
    }

    #[test]
    fn s2_leaf_page_lookup() {
        let page = s2_leaf_page();
        assert!(page.is_leaf());
        assert!(page.getpage(0).is_err());

        assert_eq!(page.getkey(0).unwrap(), b"Nabcde");
        assert_eq!(page.getkey(1).unwrap(), b"Nbcdef");
        assert_eq!(page.getkey(2).unwrap(), b"Ncdef");

        assert_eq!(page.find(b"N").unwrap(), (Action::Greater, 0));
        assert_eq!(page.find(b"Nbzzzz").unwrap(), (Action::Less, 1));
    }
}
