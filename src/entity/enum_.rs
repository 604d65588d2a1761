//! Enum types: `EnumMember` and `Enum` (the `$ enums` node family).

use std::io::{Read, Seek};

use crate::btree::Rel;
use crate::error::Result;
use crate::id0::Id0;
use crate::nodekey::make_node_key_tag;

/// One named constant of an [`Enum`].
pub struct EnumMember {
    nodeid: u64,
    value: u64,
}

impl EnumMember {
    pub fn open<R: Read + Seek>(id0: &Id0<R>, nodeid: u64) -> Result<Self> {
        let value = id0.getuint(nodeid, b'A', -3)?;
        Ok(EnumMember { nodeid, value })
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid)
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', if repeatable { 1 } else { 0 })
    }
}

/// An enum type. Bitfields share this same `$ enums` list; [`Enum::flags`]'s
/// `ENUM_FLAGS_IS_BF` bit distinguishes the two (see `entity::bitfield`).
pub struct Enum {
    nodeid: u64,
}

impl Enum {
    pub fn new(nodeid: u64) -> Self {
        Enum { nodeid }
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn count<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u64> {
        id0.getuint(self.nodeid, b'A', -1)
    }

    /// `>>20`: 0x11=hex, 0x22=dec, 0x77=oct, 0x66=bin, 0x33=char.
    /// `>>16`: 0x2 = signed.
    pub fn representation<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u32> {
        Ok(id0.getuint(self.nodeid, b'A', -3)? as u32)
    }

    /// bit0 bitfield, bit1 hidden, bit2 fromtil, bits3-5 width, bit6 ghost.
    pub fn flags<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u32> {
        Ok(id0.getuint(self.nodeid, b'A', -5)? as u32)
    }

    pub fn is_bitfield<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<bool> {
        Ok(self.flags(id0)? & 0x1 != 0)
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid)
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', if repeatable { 1 } else { 0 })
    }

    /// Cursor positioned at the first member key.
    pub fn first<'e, R: Read + Seek>(&self, id0: &'e Id0<R>) -> Result<crate::btree::Cursor<'e, R>> {
        let key = make_node_key_tag(id0.word_size(), self.nodeid, b'E');
        id0.find(Rel::GreaterEqual, &key)
    }

    pub fn lastkey<R: Read + Seek>(&self, id0: &Id0<R>) -> Vec<u8> {
        make_node_key_tag(id0.word_size(), self.nodeid, b'F')
    }

    pub fn getvalue<R: Read + Seek>(
        &self,
        id0: &Id0<R>,
        cursor: &crate::btree::Cursor<'_, R>,
    ) -> Result<EnumMember> {
        let raw = id0.getuint_cursor(cursor)?;
        EnumMember::open(id0, super::minusone(raw))
    }
}
