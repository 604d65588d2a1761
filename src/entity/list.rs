//! Generic list iteration over a node's `'A'`-tagged member references.
//!
//! Used for `$ structs`, `$ enums` and `$ scripts`.

use std::io::{Read, Seek};
use std::marker::PhantomData;

use crate::btree::{Cursor, Rel};
use crate::error::Result;
use crate::id0::Id0;
use crate::nodekey::{make_node_key_tag, make_node_key_tag_index};

use super::minusone;

/// Iterates the member ids stored under `nodeid`'s `'A'` tag, constructing
/// a `T` for each one via `make`.
pub struct List<'e, R, T, F> {
    id0: &'e Id0<R>,
    cursor: Cursor<'e, R>,
    endkey: Vec<u8>,
    make: F,
    _marker: PhantomData<T>,
}

impl<'e, R, T, F> List<'e, R, T, F>
where
    R: Read + Seek,
    F: Fn(u64) -> Result<T>,
{
    pub fn open(id0: &'e Id0<R>, nodeid: u64, make: F) -> Result<Self> {
        let start_key = make_node_key_tag(id0.word_size(), nodeid, b'A');
        let cursor = id0.find(Rel::Greater, &start_key)?;
        let endkey = make_node_key_tag_index(id0.word_size(), nodeid, b'A', u64::MAX);
        Ok(List {
            id0,
            cursor,
            endkey,
            make,
            _marker: PhantomData,
        })
    }

    pub fn eof(&self) -> bool {
        match self.cursor.getkey() {
            Ok(key) => key >= self.endkey,
            Err(_) => true,
        }
    }

    pub fn next(&mut self) -> Result<T> {
        let raw = self.id0.getuint_cursor(&self.cursor)?;
        let id = minusone(raw);
        self.cursor.next()?;
        (self.make)(id)
    }
}
