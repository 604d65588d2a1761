//! Bitfields: a second interpretation of the `$ enums` node family, used
//! when [`Enum::flags`](super::enum_::Enum::flags)'s `ENUM_FLAGS_IS_BF` bit
//! is set.

use std::io::{Read, Seek};

use crate::btree::{Cursor, Rel};
use crate::error::Result;
use crate::id0::Id0;
use crate::nodekey::{getuintbe, make_node_key_tag};
use crate::reader::WordSize;

use super::minusone;

/// One concrete value of a [`BitfieldMask`].
pub struct BitfieldValue {
    nodeid: u64,
    value: u64,
    mask: u64,
}

impl BitfieldValue {
    pub fn open<R: Read + Seek>(id0: &Id0<R>, nodeid: u64) -> Result<Self> {
        let value = id0.getuint(nodeid, b'A', -3)?;
        let mask = id0.getuint(nodeid, b'A', -6)?.wrapping_sub(1);
        Ok(BitfieldValue {
            nodeid,
            value,
            mask,
        })
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid)
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', if repeatable { 1 } else { 0 })
    }
}

/// One mask of a [`Bitfield`], with its own sub-list of named values.
pub struct BitfieldMask {
    nodeid: u64,
    mask: u64,
}

impl BitfieldMask {
    pub fn new(nodeid: u64, mask: u64) -> Self {
        BitfieldMask { nodeid, mask }
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid)
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', if repeatable { 1 } else { 0 })
    }

    pub fn first<'e, R: Read + Seek>(&self, id0: &'e Id0<R>) -> Result<Cursor<'e, R>> {
        let key = make_node_key_tag(id0.word_size(), self.nodeid, b'E');
        id0.find(Rel::GreaterEqual, &key)
    }

    pub fn lastkey<R: Read + Seek>(&self, id0: &Id0<R>) -> Vec<u8> {
        make_node_key_tag(id0.word_size(), self.nodeid, b'F')
    }

    pub fn getvalue<R: Read + Seek>(&self, id0: &Id0<R>, cursor: &Cursor<'_, R>) -> Result<BitfieldValue> {
        let raw = id0.getuint_cursor(cursor)?;
        BitfieldValue::open(id0, minusone(raw))
    }
}

/// Properties of a bitfield (shares the `$ enums` node family with [`Enum`](super::enum_::Enum)).
pub struct Bitfield {
    nodeid: u64,
}

impl Bitfield {
    pub fn new(nodeid: u64) -> Self {
        Bitfield { nodeid }
    }

    pub fn nodeid(&self) -> u64 {
        self.nodeid
    }

    pub fn count<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u64> {
        id0.getuint(self.nodeid, b'A', -1)
    }

    /// `>>20`: 0x11=hex, 0x22=dec, 0x77=oct, 0x66=bin, 0x33=char. `>>16`: 0x2 = signed.
    pub fn representation<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u32> {
        Ok(id0.getuint(self.nodeid, b'A', -3)? as u32)
    }

    /// bit0 bitfield, bit1 hidden, bit2 fromtil, bits3-5 width, bit6 ghost.
    pub fn flags<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<u32> {
        Ok(id0.getuint(self.nodeid, b'A', -5)? as u32)
    }

    pub fn name<R: Read + Seek>(&self, id0: &Id0<R>) -> Result<Vec<u8>> {
        id0.getname(self.nodeid)
    }

    pub fn comment<R: Read + Seek>(&self, id0: &Id0<R>, repeatable: bool) -> Result<Vec<u8>> {
        id0.getstr(self.nodeid, b'S', if repeatable { 1 } else { 0 })
    }

    /// For bitmasks there is an extra level, `'m'`, in between.
    pub fn first<'e, R: Read + Seek>(&self, id0: &'e Id0<R>) -> Result<Cursor<'e, R>> {
        let key = make_node_key_tag(id0.word_size(), self.nodeid, b'm');
        id0.find(Rel::GreaterEqual, &key)
    }

    pub fn lastkey<R: Read + Seek>(&self, id0: &Id0<R>) -> Vec<u8> {
        make_node_key_tag(id0.word_size(), self.nodeid, b'n')
    }

    /// Recover the mask both from the key suffix and (redundantly, as a
    /// cross-check) from the value's own `'A', -6` field.
    pub fn getmask<R: Read + Seek>(&self, id0: &Id0<R>, cursor: &Cursor<'_, R>) -> Result<BitfieldMask> {
        let key = cursor.getkey()?;
        let mask = match id0.word_size() {
            WordSize::W8 => {
                if key.len() != 18 {
                    return Err(crate::error::Error::CorruptTree(format!(
                        "bitfield mask key has unexpected length {} for a 64-bit database",
                        key.len()
                    )));
                }
                getuintbe(&key[10..18])?
            }
            WordSize::W4 => {
                if key.len() != 10 {
                    return Err(crate::error::Error::CorruptTree(format!(
                        "bitfield mask key has unexpected length {} for a 32-bit database",
                        key.len()
                    )));
                }
                getuintbe(&key[6..10])?
            }
        };
        let raw = id0.getuint_cursor(cursor)?;
        Ok(BitfieldMask::new(minusone(raw), mask))
    }
}
