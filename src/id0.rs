//! The "ID0" node store: the B-tree engine plus node-key/value decoding,
//! wired together into the higher-level `node`/`blob`/`getname`/`enumlist`
//! operations the entity layer builds on.

use std::io::{Read, Seek};

use tracing::instrument;

use crate::btree::{BtreeEngine, Cursor, Rel};
use crate::error::Result;
use crate::nodekey::{
    getstr, getuint, getuintbe, make_name_key_name, make_node_key_tag, make_node_key_tag_index,
};
use crate::reader::WordSize;
use crate::section::SectionStream;

pub struct Id0<R> {
    engine: BtreeEngine<R>,
    word_size: WordSize,
}

impl<R: Read + Seek> Id0<R> {
    pub fn open(section: SectionStream<R>, word_size: WordSize) -> Result<Self> {
        let engine = BtreeEngine::open(section)?;
        Ok(Id0 { engine, word_size })
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    pub fn node_base(&self) -> u64 {
        self.word_size.node_base()
    }

    pub fn find(&self, rel: Rel, key: &[u8]) -> Result<Cursor<'_, R>> {
        self.engine.find(rel, key)
    }

    /// `node(name)`: exact-match on the name key, or 0 if not found.
    pub fn node(&self, name: &[u8]) -> Result<u64> {
        let key = make_name_key_name(name);
        let cursor = self.find(Rel::Equal, &key)?;
        if cursor.eof() {
            return Ok(0);
        }
        getuint(&cursor.getval()?)
    }

    /// `blob(nodeid, tag, start_index, last_index)`: concatenate values of
    /// every record in the inclusive index range.
    #[instrument(skip(self))]
    pub fn blob(&self, nodeid: u64, tag: u8, start_index: u64, last_index: u64) -> Result<Vec<u8>> {
        let start_key = make_node_key_tag_index(self.word_size, nodeid, tag, start_index);
        let end_key = make_node_key_tag_index(self.word_size, nodeid, tag, last_index);
        let mut cursor = self.find(Rel::GreaterEqual, &start_key)?;
        let mut out = Vec::new();
        while !cursor.eof() {
            let key = cursor.getkey()?;
            if key.as_slice() > end_key.as_slice() {
                break;
            }
            out.extend(cursor.getval()?);
            cursor.next()?;
        }
        Ok(out)
    }

    pub fn blob_all(&self, nodeid: u64, tag: u8) -> Result<Vec<u8>> {
        self.blob(nodeid, tag, 0, 0xFFFF_FFFF)
    }

    /// `getname(nodeid)`: resolve the node's name, following the long-name
    /// indirection when the stored value's first byte is zero.
    pub fn getname(&self, nodeid: u64) -> Result<Vec<u8>> {
        let key = make_node_key_tag(self.word_size, nodeid, b'N');
        let cursor = self.find(Rel::Equal, &key)?;
        if cursor.eof() {
            return Ok(Vec::new());
        }
        let value = cursor.getval()?;
        if value.first() == Some(&0) {
            let name_id = getuintbe(&value[1..])?;
            let blob = self.blob(self.node_base(), b'S', name_id * 256, name_id * 256 + 32)?;
            Ok(getstr(&blob).to_vec())
        } else {
            Ok(getstr(&value).to_vec())
        }
    }

    /// `enumlist(nodeid, tag, callback)`: iterate the tag range, invoking
    /// `callback` with each stored value minus one (the sentinel-offset
    /// list encoding).
    pub fn enumlist(&self, nodeid: u64, tag: u8, mut callback: impl FnMut(u64) -> Result<()>) -> Result<()> {
        let start_key = make_node_key_tag(self.word_size, nodeid, tag);
        let end_key = make_node_key_tag(self.word_size, nodeid, tag + 1);
        let mut cursor = self.find(Rel::GreaterEqual, &start_key)?;
        while !cursor.eof() {
            let key = cursor.getkey()?;
            if key.as_slice() > end_key.as_slice() {
                break;
            }
            let value = getuint(&cursor.getval()?)?;
            if value > 0 {
                callback(value - 1)?;
            }
            cursor.next()?;
        }
        Ok(())
    }

    /// `getuint(nodeid, tag, index)`: exact-match scalar lookup, or `None`.
    pub fn getuint_at(&self, nodeid: u64, tag: u8, index: i64) -> Result<Option<u64>> {
        let key = make_node_key_tag_index(self.word_size, nodeid, tag, index as u64);
        let cursor = self.find(Rel::Equal, &key)?;
        if cursor.eof() {
            Ok(None)
        } else {
            Ok(Some(getuint(&cursor.getval()?)?))
        }
    }

    /// `getstr(nodeid, tag, index)`: exact-match zero-trimmed string lookup.
    pub fn getstr_at(&self, nodeid: u64, tag: u8, index: i64) -> Result<Vec<u8>> {
        let key = make_node_key_tag_index(self.word_size, nodeid, tag, index as u64);
        let cursor = self.find(Rel::Equal, &key)?;
        if cursor.eof() {
            Ok(Vec::new())
        } else {
            Ok(getstr(&cursor.getval()?).to_vec())
        }
    }

    /// `getdata(nodeid, tag, index)`: exact-match raw value lookup, no
    /// scalar decoding or zero-trimming.
    pub fn getdata_at(&self, nodeid: u64, tag: u8, index: i64) -> Result<Option<Vec<u8>>> {
        let key = make_node_key_tag_index(self.word_size, nodeid, tag, index as u64);
        let cursor = self.find(Rel::Equal, &key)?;
        if cursor.eof() {
            Ok(None)
        } else {
            Ok(Some(cursor.getval()?))
        }
    }

    /// "Easy" interface mirrored from the original: returns the default
    /// (`0` / empty) instead of an error when the record is absent.
    pub fn getuint(&self, nodeid: u64, tag: u8, index: i64) -> Result<u64> {
        Ok(self.getuint_at(nodeid, tag, index)?.unwrap_or(0))
    }

    pub fn getdata(&self, nodeid: u64, tag: u8, index: i64) -> Result<Vec<u8>> {
        Ok(self.getdata_at(nodeid, tag, index)?.unwrap_or_default())
    }

    pub fn getstr(&self, nodeid: u64, tag: u8, index: i64) -> Result<Vec<u8>> {
        self.getstr_at(nodeid, tag, index)
    }

    /// Scalar decode of the value currently under a cursor (for list-style
    /// iteration callers that already hold a positioned cursor).
    pub fn getuint_cursor(&self, cursor: &Cursor<'_, R>) -> Result<u64> {
        getuint(&cursor.getval()?)
    }
}
